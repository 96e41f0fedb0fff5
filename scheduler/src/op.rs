//! Operation records and the function types the scheduler executes.

use std::any::Any;

use crate::Scheduler;

/// Opaque data moved between the coordinating thread and a worker.
pub type Payload = Box<dyn Any + Send>;

/// What a do-function's single attempt produced.
pub enum DoResult {
    /// The work finished; the payload goes to the callback.
    Done(Payload),
    /// The work could not make progress yet (a non-blocking resource was
    /// busy). The operation returns to pending on the low-priority queue and
    /// will be attempted again.
    NotReady,
}

/// The blocking work unit. Runs off the coordinating thread, possibly several
/// times if it keeps signalling [`DoResult::NotReady`].
pub type DoFn = Box<dyn FnMut(&mut Payload) -> DoResult + Send>;

/// The completion handler. Runs on the coordinating thread, exactly once per
/// submitted operation, never concurrently with another callback.
pub type Callback = Box<dyn FnOnce(&Scheduler, Outcome) + Send>;

/// A zero-work call queued for the next coordinating-thread tick.
pub type DelayedCall = Box<dyn FnOnce(&Scheduler)>;

/// Why a finished do-function has no usable value.
#[derive(Debug)]
pub enum OperationError {
    /// The do-function panicked; the message is whatever the panic payload
    /// carried.
    Panic(String),
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationError::Panic(msg) => write!(f, "operation panicked: {msg}"),
        }
    }
}

impl std::error::Error for OperationError {}

/// What a callback receives: the error/value pair of the completed attempt.
pub struct Outcome {
    pub error: Option<OperationError>,
    pub value: Option<Payload>,
}

impl Outcome {
    pub fn done(value: Payload) -> Self {
        Self {
            error: None,
            value: Some(value),
        }
    }

    pub fn failed(error: OperationError) -> Self {
        Self {
            error: Some(error),
            value: None,
        }
    }
}

/// One submitted unit of asynchronous work.
///
/// Lives on the active or low-priority queue until a worker claims it, then
/// travels through the done channel back to the coordinating thread, which
/// retires it after running its callback.
pub struct AsyncOperation {
    pub(crate) id: u64,
    pub(crate) input: Payload,
    pub(crate) do_fn: DoFn,
    pub(crate) callback: Option<Callback>,
    pub(crate) started: bool,
    pub(crate) done: bool,
    pub(crate) outcome: Option<Outcome>,
}

impl AsyncOperation {
    pub(crate) fn new(id: u64, input: Payload, do_fn: DoFn, callback: Callback) -> Self {
        Self {
            id,
            input,
            do_fn,
            callback: Some(callback),
            started: false,
            done: false,
            outcome: None,
        }
    }
}

/// A top-level completion value, mapped to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    None,
    Bool(bool),
    Int(i32),
}

impl Completion {
    /// `true`/`none` are success, `false` is failure, numbers pass through.
    pub fn exit_code(self) -> i32 {
        match self {
            Completion::None | Completion::Bool(true) => 0,
            Completion::Bool(false) => 1,
            Completion::Int(code) => code,
        }
    }
}
