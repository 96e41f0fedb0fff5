//! Cleanup bookkeeping for `do`/`rescue`/`finally` levels crossed by a
//! deferred call.
//!
//! When a protected block contains a deferred call, its handlers are hoisted
//! into named closures and every continuation synthesized inside the block
//! replays them through a guard skeleton. One [`CleanupFrame`] per lexical
//! level records the closure names plus the two disabler variables that keep
//! each handler from running more than once. Frames are shared *by name*:
//! every continuation built under the same level references the same
//! variables, so a handler that already ran in one resumption stays disabled
//! in the next.

/// One hoisted `do`/`rescue`/`finally` level.
#[derive(Debug, Clone)]
pub struct CleanupFrame {
    /// Hoisted rescue closure, if the level has a `rescue` clause.
    pub rescue_fn: Option<String>,
    /// Hoisted finally closure, if the level has a `finally` clause.
    pub finally_fn: Option<String>,
    /// Error type filter from the original `rescue` header, verbatim.
    pub rescue_ty: Option<String>,
    /// Disabler for the rescue handler.
    pub disable_rescue: String,
    /// Disabler for the finally handler.
    pub disable_finally: String,
}
