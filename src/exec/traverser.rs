// src/exec/traverser.rs

//! Pluggable traversal strategy abstraction.
//!
//! The runtime resets the [`Scheduler`] and then hands the pass to a
//! `Traverser`, which repeatedly draws ready systems, runs them through the
//! supplied [`RunFn`], and reports every completion back to the scheduler
//! with `mark_finished`.
//!
//! - [`SequentialTraverser`](super::SequentialTraverser) runs everything on
//!   the calling thread.
//! - [`ConcurrentTraverser`](super::ConcurrentTraverser) dispatches to a
//!   bounded worker pool per affinity.

use std::sync::Arc;

use tracing::warn;

use crate::dag::Scheduler;
use crate::errors::Result;
use crate::registry::{AffinityTag, Tag};
use crate::types::TraverserKind;

use super::{ConcurrentTraverser, SequentialTraverser};

/// Executes the behavior of one system for the current pass.
pub type RunFn = Arc<dyn Fn(Tag) + Send + Sync>;

pub trait Traverser: Send {
    /// Run one full pass. Returns once every system has finished.
    ///
    /// The scheduler must have been reset for this pass. Implementations
    /// call `scheduler.mark_finished(tag)` after `run(tag)` returns.
    fn traverse(&mut self, scheduler: &Arc<Scheduler>, run: &RunFn) -> Result<()>;

    /// Limit how many systems bound to `affinity` may run at once.
    ///
    /// Strategies without real concurrency ignore this.
    fn set_capacity(&mut self, _affinity: AffinityTag, _capacity: usize) {}

    fn kind(&self) -> TraverserKind;
}

/// Construct the traverser for `kind`.
pub fn make_traverser(kind: TraverserKind) -> Box<dyn Traverser> {
    match kind {
        TraverserKind::Sequential => Box::new(SequentialTraverser::new()),
        TraverserKind::Concurrent => Box::new(ConcurrentTraverser::new()),
    }
}

/// Block the dispatching thread forever.
///
/// Reached when nothing is ready, nothing is running and the pass has not
/// finished, which only happens for a graph with a dependency cycle.
pub(crate) fn stall(scheduler: &Scheduler) -> ! {
    let pending: Vec<String> = scheduler
        .topology()
        .nodes()
        .filter(|n| !scheduler.finished().contains(n.tag))
        .map(|n| n.name.clone())
        .collect();
    warn!(
        pass = scheduler.pass_id(),
        ?pending,
        "no system is ready and none is running; the graph contains a dependency cycle"
    );
    loop {
        std::thread::park();
    }
}
