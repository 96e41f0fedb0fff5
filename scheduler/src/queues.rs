//! Shared state between the coordinating thread and the worker pool.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::op::AsyncOperation;

/// How many low-priority operations a worker promotes per promotion pass.
pub(crate) const PROMOTE_BATCH: usize = 2;

/// A worker runs a promotion pass every this many queue scans, and whenever
/// the active queue is empty. Bounds retry starvation behind fresh work.
pub(crate) const PROMOTE_INTERVAL: u32 = 8;

/// The two pending-work queues, guarded by [`Shared::queues`].
pub(crate) struct WorkQueues {
    /// Freshly submitted operations.
    pub active: VecDeque<AsyncOperation>,
    /// Operations that signalled not-ready, retried behind active work.
    pub low: VecDeque<AsyncOperation>,
}

impl WorkQueues {
    pub fn new() -> Self {
        Self {
            active: VecDeque::new(),
            low: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.low.is_empty()
    }

    /// Moves up to [`PROMOTE_BATCH`] retries back into the active queue.
    pub fn promote(&mut self) {
        for _ in 0..PROMOTE_BATCH {
            match self.low.pop_front() {
                Some(op) => self.active.push_back(op),
                None => break,
            }
        }
    }
}

/// Everything the worker pool shares with the coordinating thread.
pub(crate) struct Shared {
    pub queues: Mutex<WorkQueues>,
    /// Signalled on submission and on stop.
    pub available: Condvar,
    /// Operations claimed by a worker but not yet pushed to a queue or the
    /// done channel. Part of the shutdown condition.
    pub in_flight: AtomicUsize,
    pub stop: AtomicBool,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(WorkQueues::new()),
            available: Condvar::new(),
            in_flight: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
        }
    }

    /// Locks the queues, recovering the guard if a worker panicked while
    /// holding the lock.
    pub fn lock_queues(&self) -> MutexGuard<'_, WorkQueues> {
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }
}
