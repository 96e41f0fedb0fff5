//! Worker-pool scheduler for continuation-passing programs.
//!
//! Blocking work units (do-functions) run on a fixed pool of worker threads;
//! their completion handlers (callbacks) run back on the coordinating thread,
//! one at a time. Callbacks typically resume a continuation closure, which may
//! submit further operations, so the coordinating loop keeps draining until
//! every queue and the in-flight counter are empty.
//!
//! Four queues carry an operation through its life: *active* (pending work),
//! *low-priority* (work that signalled not-ready and is retried behind fresh
//! submissions), *done* (finished, waiting for callback dispatch), and
//! *delayed* (zero-work calls deferred one coordinating-thread tick, used to
//! break unbounded synchronous completion chains).
//!
//! Guarantees: exactly one callback per submitted operation; at most one
//! worker runs a given operation's do-function per started transition; no two
//! callbacks ever run concurrently.

pub mod op;
mod queues;
mod worker;

#[cfg(test)]
mod tests;

pub use op::{
    AsyncOperation, Callback, Completion, DelayedCall, DoFn, DoResult, OperationError, Outcome,
    Payload,
};

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error};

use queues::Shared;

const POLL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Worker pool size.
    pub workers: usize,
    /// Number of top-level completions to ignore before recording the exit
    /// status, for nested re-entrant loops.
    pub extra_bail: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            extra_bail: 0,
        }
    }
}

/// The coordinating-thread half of the runtime.
///
/// Owned by exactly one thread; everything workers touch lives behind the
/// shared queue state.
pub struct Scheduler {
    config: SchedulerConfig,
    shared: Arc<Shared>,
    done_tx: Sender<AsyncOperation>,
    done_rx: Receiver<AsyncOperation>,
    delayed: RefCell<VecDeque<DelayedCall>>,
    workers: RefCell<Vec<JoinHandle<()>>>,
    next_id: Cell<u64>,
    extra_bail: Cell<u32>,
    exit_status: Cell<i32>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (done_tx, done_rx) = channel();
        let extra_bail = config.extra_bail;
        Self {
            config,
            shared: Arc::new(Shared::new()),
            done_tx,
            done_rx,
            delayed: RefCell::new(VecDeque::new()),
            workers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            extra_bail: Cell::new(extra_bail),
            exit_status: Cell::new(0),
        }
    }

    /// Enqueues a do-function with its completion callback and returns
    /// immediately. The callback will run on the coordinating thread exactly
    /// once.
    pub fn submit(&self, input: Payload, do_fn: DoFn, callback: Callback) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let op = AsyncOperation::new(id, input, do_fn, callback);
        self.shared.lock_queues().active.push_back(op);
        self.shared.available.notify_one();
        debug!(op = id, "submitted");
        id
    }

    /// Enqueues a zero-work call for the next coordinating-thread tick.
    ///
    /// Delayed calls run only when the done queue is empty, so a completion
    /// chain that would otherwise recurse synchronously unwinds one tick at a
    /// time.
    pub fn submit_delayed(&self, call: DelayedCall) {
        self.delayed.borrow_mut().push_back(call);
    }

    /// Records a top-level completion. The first `extra_bail` completions are
    /// ignored; afterwards the latest completion decides the exit status.
    pub fn report_exit(&self, completion: Completion) {
        let bail = self.extra_bail.get();
        if bail > 0 {
            self.extra_bail.set(bail - 1);
            debug!(?completion, remaining = bail - 1, "completion bailed");
            return;
        }
        self.exit_status.set(completion.exit_code());
    }

    /// Starts the workers, runs `entry`, and drains all queues. Returns the
    /// accumulated exit status once no work remains.
    pub fn run_to_completion(&self, entry: impl FnOnce(&Scheduler)) -> i32 {
        self.spawn_workers();
        entry(self);

        loop {
            match self.done_rx.try_recv() {
                Ok(op) => {
                    self.dispatch(op);
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }

            let next_delayed = self.delayed.borrow_mut().pop_front();
            if let Some(call) = next_delayed {
                call(self);
                continue;
            }

            if self.idle() {
                // A worker may have finished between the try_recv above and
                // the idle check; the in-flight counter is decremented after
                // the send, so one more receive attempt settles it.
                match self.done_rx.try_recv() {
                    Ok(op) => {
                        self.dispatch(op);
                        continue;
                    }
                    Err(_) => break,
                }
            }

            if let Ok(op) = self.done_rx.recv_timeout(POLL) {
                self.dispatch(op);
            }
        }

        self.shutdown();
        debug!(status = self.exit_status.get(), "scheduler drained");
        self.exit_status.get()
    }

    /// Entry point for compiled programs: drains everything, then exits the
    /// process with the accumulated status.
    pub fn run(self, entry: impl FnOnce(&Scheduler)) -> ! {
        let status = self.run_to_completion(entry);
        std::process::exit(status)
    }

    /// Runs one retired operation's callback on this thread. A panic in the
    /// callback stops the workers and resumes unwinding.
    fn dispatch(&self, mut op: AsyncOperation) {
        debug_assert!(op.done);
        let Some(callback) = op.callback.take() else {
            return;
        };
        let outcome = op.outcome.take().unwrap_or(Outcome {
            error: None,
            value: None,
        });
        let result = catch_unwind(AssertUnwindSafe(|| callback(self, outcome)));
        if let Err(panic) = result {
            error!(op = op.id, "callback panicked, stopping workers");
            self.shutdown();
            resume_unwind(panic);
        }
    }

    /// True when no queue holds work and nothing is in flight.
    fn idle(&self) -> bool {
        if !self.delayed.borrow().is_empty() {
            return false;
        }
        let queues = self.shared.lock_queues();
        queues.is_empty() && self.shared.in_flight.load(Ordering::Acquire) == 0
    }

    fn spawn_workers(&self) {
        let mut workers = self.workers.borrow_mut();
        if !workers.is_empty() {
            return;
        }
        // A previous drain left the stop flag set; re-arm it so the same
        // scheduler can run again.
        self.shared.stop.store(false, Ordering::Release);
        for i in 0..self.config.workers.max(1) {
            let shared = Arc::clone(&self.shared);
            let done_tx = self.done_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("sched-worker-{i}"))
                .spawn(move || worker::worker_loop(shared, done_tx));
            match handle {
                Ok(handle) => workers.push(handle),
                Err(err) => error!(%err, "failed to spawn worker"),
            }
        }
    }

    fn shutdown(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.available.notify_all();
        for handle in self.workers.borrow_mut().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
