// src/exec/sequential.rs

//! Single-threaded traversal.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::dag::{Next, Scheduler, Topology};
use crate::errors::Result;
use crate::exec::affinity::{Affinity, DefaultAffinity};
use crate::registry::AffinityTag;
use crate::types::TraverserKind;

use super::traverser::{stall, RunFn, Traverser};

/// Runs every system on the calling thread, in scheduler order.
///
/// One context per affinity is created the first time a system bound to it
/// runs; contexts only receive their `init`/`teardown` hooks and are torn
/// down when the traverser is dropped.
#[derive(Default)]
pub struct SequentialTraverser {
    contexts: BTreeMap<AffinityTag, (String, Box<dyn Affinity>)>,
}

impl SequentialTraverser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of affinity contexts created so far.
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    fn ensure_context(&mut self, topology: &Topology, affinity: AffinityTag) {
        if self.contexts.contains_key(&affinity) {
            return;
        }

        let name = topology.affinity_name(affinity);
        let mut context = match topology.affinity(affinity) {
            Some(entry) => (entry.factory)(),
            None => Box::new(DefaultAffinity) as Box<dyn Affinity>,
        };
        debug!(affinity = %name, "initialising affinity context");
        context.init();
        self.contexts.insert(affinity, (name, context));
    }
}

impl Traverser for SequentialTraverser {
    fn traverse(&mut self, scheduler: &Arc<Scheduler>, run: &RunFn) -> Result<()> {
        let topology = Arc::clone(scheduler.topology());

        loop {
            match scheduler.take_ready() {
                Next::Ready(tag) => {
                    self.ensure_context(&topology, topology.affinity_of(tag));
                    trace!(%tag, "running system on calling thread");
                    run(tag);
                    scheduler.mark_finished(tag);
                }
                Next::Finished => return Ok(()),
                Next::Blocked => stall(scheduler),
            }
        }
    }

    fn kind(&self) -> TraverserKind {
        TraverserKind::Sequential
    }
}

impl Drop for SequentialTraverser {
    fn drop(&mut self) {
        for (_, (name, mut context)) in std::mem::take(&mut self.contexts) {
            debug!(affinity = %name, "tearing down affinity context");
            context.teardown();
        }
        info!("sequential traverser disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{Group, System};
    use crate::registry::TagRegistry;

    struct Noop;
    impl System<()> for Noop {}

    struct Gl;
    impl Affinity for Gl {}

    #[test]
    fn contexts_are_created_once_per_affinity() {
        let mut group: Group<()> = Group::with_registry(Arc::new(TagRegistry::new()));
        let registry = Arc::clone(group.registry());
        let gl = registry.affinity_named("gl");
        for name in ["a", "b"] {
            group.add_node(registry.system_named(name), Noop);
        }
        for name in ["c", "d"] {
            group
                .add_node(registry.system_named(name), Noop)
                .with_affinity_fn(gl, || Gl);
        }
        let (topology, _systems) = group.freeze();
        let scheduler = Arc::new(Scheduler::new(topology));
        let run: RunFn = Arc::new(|_tag| {});
        let mut traverser = SequentialTraverser::new();
        assert_eq!(traverser.context_count(), 0);

        for _ in 0..2 {
            scheduler.reset();
            traverser.traverse(&scheduler, &run).unwrap();
        }

        assert!(scheduler.is_finished());
        assert_eq!(traverser.context_count(), 2);
    }
}
