// src/dag/next.rs

//! Result type of drawing from the ready set.

use crate::registry::Tag;

/// Outcome of [`Scheduler::take_ready`](crate::dag::Scheduler::take_ready).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// This system's dependencies are satisfied; it is now owned by the
    /// caller until reported finished (or requeued).
    Ready(Tag),
    /// Nothing is ready but some systems have not finished yet.
    Blocked,
    /// Every system of the pass has finished.
    Finished,
}
