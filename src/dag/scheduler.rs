// src/dag/scheduler.rs

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::dag::graph::Topology;
use crate::dag::next::Next;
use crate::dag::tag_set::TagSet;
use crate::registry::Tag;

/// Scheduler holds the frozen topology plus mutable per-pass state.
///
/// It is responsible for:
/// - seeding the ready set with the roots at the start of every pass
/// - handing out ready systems, lowest tag first
/// - recording completions and releasing successors whose dependencies
///   are now all finished
/// - taking back systems a traverser drew but could not dispatch
///
/// All four operations share one lock and never block while holding it.
/// This is the only state shared between worker threads during a pass.
#[derive(Debug)]
pub struct Scheduler {
    topology: Arc<Topology>,
    state: Mutex<PassState>,
}

#[derive(Debug, Default)]
struct PassState {
    ready: BTreeSet<Tag>,
    done: TagSet,
    /// Monotonically increasing pass identifier; 0 before the first pass.
    pass_id: u64,
}

impl Scheduler {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology: Arc::new(topology),
            state: Mutex::new(PassState::default()),
        }
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Start a new pass: ready = roots, done = {}.
    ///
    /// Returns the new pass ID.
    pub fn reset(&self) -> u64 {
        let mut state = self.lock();
        state.ready = self.topology.roots().clone();
        state.done.clear();
        state.pass_id += 1;

        debug!(
            pass = state.pass_id,
            roots = state.ready.len(),
            systems = self.topology.len(),
            "scheduler: starting new pass"
        );
        state.pass_id
    }

    /// Draw one ready system, or report why none is available.
    pub fn take_ready(&self) -> Next {
        let mut state = self.lock();
        match state.ready.pop_first() {
            Some(tag) => {
                trace!(%tag, pass = state.pass_id, "drew ready system");
                Next::Ready(tag)
            }
            None if state.done == *self.topology.membership() => Next::Finished,
            None => Next::Blocked,
        }
    }

    /// Record that `tag` finished and release successors that became ready.
    ///
    /// Unknown tags are ignored.
    pub fn mark_finished(&self, tag: Tag) {
        let Some(node) = self.topology.node(tag) else {
            warn!(%tag, "completion for unknown system; ignoring");
            return;
        };

        let mut state = self.lock();
        if state.done.contains(tag) {
            warn!(system = %node.name, pass = state.pass_id, "system reported finished twice in one pass");
            return;
        }
        state.done.insert(tag);
        trace!(system = %node.name, pass = state.pass_id, "system finished");

        for next in node.successors.iter() {
            let Some(successor) = self.topology.node(*next) else {
                continue;
            };
            if state.done.is_superset(&successor.dependencies) {
                trace!(
                    system = %successor.name,
                    pass = state.pass_id,
                    "dependencies satisfied; marking ready"
                );
                state.ready.insert(*next);
            }
        }
    }

    /// Put back a system that was drawn but could not be dispatched.
    pub fn requeue(&self, tag: Tag) {
        let mut state = self.lock();
        trace!(%tag, pass = state.pass_id, "requeued system");
        state.ready.insert(tag);
    }

    /// Whether every system finished in the current pass.
    pub fn is_finished(&self) -> bool {
        self.lock().done == *self.topology.membership()
    }

    /// Snapshot of the systems finished so far in the current pass.
    pub fn finished(&self) -> TagSet {
        self.lock().done
    }

    /// ID of the current (or last) pass.
    pub fn pass_id(&self) -> u64 {
        self.lock().pass_id
    }

    fn lock(&self) -> MutexGuard<'_, PassState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::graph::Group;
    use crate::dag::node::System;
    use crate::registry::TagRegistry;

    struct Noop;
    impl System<()> for Noop {}

    /// C <- A, D <- B, D <- C, F <- C, F <- E
    fn scenario() -> (Scheduler, [Tag; 6]) {
        let reg = Arc::new(TagRegistry::new());
        let [a, b, c, d, e, f] = ["A", "B", "C", "D", "E", "F"].map(|n| reg.system_named(n));

        let mut g = Group::<()>::with_registry(Arc::clone(&reg));
        g.add_node(a, Noop);
        g.add_node(b, Noop);
        g.add_node(c, Noop).depends_on_tag(a);
        g.add_node(d, Noop).depends_on_tag(b).and_tag(c);
        g.add_node(e, Noop);
        g.add_node(f, Noop).depends_on_tag(c).and_tag(e);

        let (topology, _) = g.freeze();
        (Scheduler::new(topology), [a, b, c, d, e, f])
    }

    #[test]
    fn draws_roots_in_tag_order_then_blocks() {
        let (s, [a, b, _c, _d, e, _f]) = scenario();
        s.reset();

        assert_eq!(s.take_ready(), Next::Ready(a));
        assert_eq!(s.take_ready(), Next::Ready(b));
        assert_eq!(s.take_ready(), Next::Ready(e));
        assert_eq!(s.take_ready(), Next::Blocked);
    }

    #[test]
    fn completion_releases_successors_only_when_all_deps_done() {
        let (s, [a, b, c, d, e, f]) = scenario();
        s.reset();
        for _ in 0..3 {
            s.take_ready();
        }

        s.mark_finished(a);
        assert_eq!(s.take_ready(), Next::Ready(c));
        s.mark_finished(c);
        // D still waits for B, F still waits for E.
        assert_eq!(s.take_ready(), Next::Blocked);

        s.mark_finished(b);
        assert_eq!(s.take_ready(), Next::Ready(d));
        s.mark_finished(e);
        assert_eq!(s.take_ready(), Next::Ready(f));

        s.mark_finished(d);
        assert!(!s.is_finished());
        s.mark_finished(f);
        assert!(s.is_finished());
        assert_eq!(s.take_ready(), Next::Finished);
    }

    #[test]
    fn requeue_puts_system_back_without_completing_it() {
        let (s, [a, ..]) = scenario();
        s.reset();
        assert_eq!(s.take_ready(), Next::Ready(a));
        s.requeue(a);
        assert!(!s.finished().contains(a));
        assert_eq!(s.take_ready(), Next::Ready(a));
    }

    #[test]
    fn reset_discards_previous_pass_state() {
        let (s, tags) = scenario();
        let first = s.reset();
        loop {
            match s.take_ready() {
                Next::Ready(tag) => s.mark_finished(tag),
                Next::Finished => break,
                Next::Blocked => panic!("acyclic scenario must not block"),
            }
        }
        assert!(s.is_finished());

        let second = s.reset();
        assert_eq!(second, first + 1);
        assert!(s.finished().is_empty());
        assert!(!s.is_finished());
        assert_eq!(s.take_ready(), Next::Ready(tags[0]));
    }

    #[test]
    fn unknown_and_repeated_completions_are_ignored() {
        let (s, [a, ..]) = scenario();
        s.reset();
        s.mark_finished(Tag::from_index(200));
        assert!(s.finished().is_empty());

        s.take_ready();
        s.mark_finished(a);
        s.mark_finished(a);
        assert_eq!(s.finished().len(), 1);
    }
}
