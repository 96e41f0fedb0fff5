//! The worker-thread loop.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Sender;
use std::time::Duration;

use tracing::{error, trace};

use crate::op::{AsyncOperation, DoResult, Outcome};
use crate::queues::{PROMOTE_INTERVAL, Shared};

const POLL: Duration = Duration::from_millis(1);

/// Claims operations off the active queue and runs their do-functions until
/// the stop flag is set.
///
/// Claim and in-flight increment happen under the queue lock, so the
/// coordinating thread never observes empty queues with the operation
/// unaccounted for. A finished operation is sent on the done channel *before*
/// the in-flight decrement for the same reason.
pub(crate) fn worker_loop(shared: Arc<Shared>, done_tx: Sender<AsyncOperation>) {
    let mut scans: u32 = 0;
    loop {
        let mut op = {
            let mut queues = shared.lock_queues();
            loop {
                if shared.stop.load(Ordering::Acquire) {
                    return;
                }
                scans = scans.wrapping_add(1);
                if queues.active.is_empty() || scans % PROMOTE_INTERVAL == 0 {
                    queues.promote();
                }
                if let Some(mut op) = queues.active.pop_front() {
                    op.started = true;
                    shared.in_flight.fetch_add(1, Ordering::AcqRel);
                    break op;
                }
                let (guard, _) = shared
                    .available
                    .wait_timeout(queues, POLL)
                    .unwrap_or_else(|e| e.into_inner());
                queues = guard;
            }
        };

        trace!(op = op.id, "running do-function");
        let attempt = catch_unwind(AssertUnwindSafe(|| (op.do_fn)(&mut op.input)));
        match attempt {
            Ok(DoResult::NotReady) => {
                trace!(op = op.id, "not ready, requeueing low priority");
                op.started = false;
                shared.lock_queues().low.push_back(op);
                shared.in_flight.fetch_sub(1, Ordering::Release);
            }
            Ok(DoResult::Done(value)) => {
                op.done = true;
                op.outcome = Some(Outcome::done(value));
                finish(&shared, &done_tx, op);
            }
            Err(panic) => {
                // The operation still reaches dispatch: the callback sees a
                // synthesized error outcome instead of a value.
                let msg = panic_message(panic.as_ref());
                error!(op = op.id, %msg, "do-function panicked");
                op.done = true;
                op.outcome = Some(Outcome::failed(crate::op::OperationError::Panic(msg)));
                finish(&shared, &done_tx, op);
            }
        }
    }
}

fn finish(shared: &Shared, done_tx: &Sender<AsyncOperation>, op: AsyncOperation) {
    // A send error means the coordinator is gone; drop the operation.
    let _ = done_tx.send(op);
    shared.in_flight.fetch_sub(1, Ordering::Release);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
