// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::model::{ConfigFile, PoolSection};
use crate::dag::{EdgeBuilder, Group, Scheduler, System, Topology};
use crate::errors::{violation, GraphError, Result};
use crate::exec::{make_traverser, Affinity, DefaultAffinity, RunFn, Traverser};
use crate::registry::{AffinityTag, Tag, TagRegistry, DEFAULT_AFFINITY_NAME};
use crate::types::TraverserKind;

use super::systems::SystemTable;
use super::Pass;

/// Everything that exists only once the root group is frozen.
struct Frozen<C> {
    scheduler: Arc<Scheduler>,
    systems: Arc<SystemTable<C>>,
}

/// Owns a graph of systems and runs `configure`/`update` passes over it.
///
/// Systems are added through the runtime's root group. The first pass
/// freezes that group; from then on the graph is read-only and every pass
/// runs each system exactly once, in dependency order, through the chosen
/// [`Traverser`].
///
/// ```ignore
/// let mut runtime = Runtime::<World>::concurrent();
/// runtime.add_system::<Input>();
/// runtime.add_system::<Physics>().depends_on::<Input>();
/// runtime.set_capacity::<RenderThread>(1);
///
/// let world = Arc::new(World::default());
/// runtime.configure(&world)?;
/// runtime.update(&world)?;
/// ```
pub struct Runtime<C> {
    root: Group<C>,
    frozen: Option<Frozen<C>>,
    traverser: Box<dyn Traverser>,
    /// Capacities by affinity name, resolved against the registry on freeze.
    named_capacities: Vec<(String, usize)>,
    passes: u64,
}

impl<C: 'static> fmt::Debug for Runtime<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("traverser", &self.traverser.kind())
            .field("systems", &self.root.len())
            .field("frozen", &self.frozen.is_some())
            .field("passes", &self.passes)
            .finish_non_exhaustive()
    }
}

impl<C: Send + Sync + 'static> Runtime<C> {
    /// Runtime on the process-wide registry using the `kind` strategy.
    pub fn new(kind: TraverserKind) -> Self {
        Self::with_traverser(TagRegistry::global(), make_traverser(kind))
    }

    pub fn sequential() -> Self {
        Self::new(TraverserKind::Sequential)
    }

    pub fn concurrent() -> Self {
        Self::new(TraverserKind::Concurrent)
    }

    pub fn with_traverser(registry: Arc<TagRegistry>, traverser: Box<dyn Traverser>) -> Self {
        let mut root = Group::with_registry(registry);
        root.register_affinity::<DefaultAffinity>();
        debug!(traverser = %traverser.kind(), "runtime created");
        Self {
            root,
            frozen: None,
            traverser,
            named_capacities: Vec::new(),
            passes: 0,
        }
    }

    /// Runtime configured from a validated config file.
    #[track_caller]
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut runtime = Self::new(cfg.traverser);
        runtime.apply_pool(&cfg.pool);
        runtime
    }

    /// Apply the capacities of a `[pool]` section.
    #[track_caller]
    pub fn apply_pool(&mut self, pool: &PoolSection) {
        if let Some(capacity) = pool.default_capacity {
            self.set_default_capacity(capacity);
        }
        for (name, capacity) in &pool.affinity {
            self.set_capacity_named(name, *capacity);
        }
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        self.root.registry()
    }

    /// The root group. Use the forwarding methods below to modify it.
    pub fn group(&self) -> &Group<C> {
        &self.root
    }

    pub fn topology(&self) -> &Topology {
        self.root.topology()
    }

    pub fn traverser_kind(&self) -> TraverserKind {
        self.traverser.kind()
    }

    /// True once the first pass has run.
    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Number of passes that ran to completion.
    pub fn pass_count(&self) -> u64 {
        self.passes
    }

    #[track_caller]
    pub fn add_system<T>(&mut self) -> EdgeBuilder<'_, C>
    where
        T: System<C> + Default,
    {
        self.root.add_system::<T>()
    }

    #[track_caller]
    pub fn add_node(&mut self, tag: Tag, system: impl System<C>) -> EdgeBuilder<'_, C> {
        self.root.add_node(tag, system)
    }

    #[track_caller]
    pub fn add_group(&mut self, group: &mut Group<C>) -> EdgeBuilder<'_, C> {
        self.root.add_group(group)
    }

    /// Allow at most `capacity` systems bound to `A` to run at once.
    #[track_caller]
    pub fn set_capacity<A: Affinity>(&mut self, capacity: usize) {
        let affinity = self.registry().affinity_tag::<A>();
        self.set_capacity_tag(affinity, capacity);
    }

    #[track_caller]
    pub fn set_default_capacity(&mut self, capacity: usize) {
        self.set_capacity_tag(AffinityTag::DEFAULT, capacity);
    }

    #[track_caller]
    pub fn set_capacity_tag(&mut self, affinity: AffinityTag, capacity: usize) {
        if capacity == 0 {
            violation(GraphError::ZeroCapacity {
                affinity: self.registry().affinity_name(affinity),
            });
        }
        self.traverser.set_capacity(affinity, capacity);
    }

    /// Set the capacity of every affinity whose display name is `name`.
    ///
    /// Resolved when the graph is frozen, so the affinity does not need to
    /// be bound yet. `"default"` is reserved, as in `[pool.affinity]`.
    #[track_caller]
    pub fn set_capacity_named(&mut self, name: &str, capacity: usize) {
        if name == DEFAULT_AFFINITY_NAME {
            violation(GraphError::ReservedAffinityName {
                name: name.to_string(),
            });
        }
        if capacity == 0 {
            violation(GraphError::ZeroCapacity {
                affinity: name.to_string(),
            });
        }
        if self.frozen.is_some() {
            self.apply_named_capacity(name, capacity);
        } else {
            self.named_capacities.push((name.to_string(), capacity));
        }
    }

    /// Run every system's `configure` behavior once.
    pub fn configure(&mut self, ctx: &Arc<C>) -> Result<()> {
        self.run_pass(Pass::Configure, ctx)
    }

    /// Run every system's `update` behavior once.
    pub fn update(&mut self, ctx: &Arc<C>) -> Result<()> {
        self.run_pass(Pass::Update, ctx)
    }

    fn run_pass(&mut self, pass: Pass, ctx: &Arc<C>) -> Result<()> {
        let (scheduler, systems) = self.freeze();
        let pass_id = scheduler.reset();
        info!(
            pass = pass_id,
            kind = %pass,
            systems = scheduler.topology().len(),
            "pass started"
        );

        let ctx = Arc::clone(ctx);
        let run: RunFn = Arc::new(move |tag| systems.run(tag, pass, &ctx));
        self.traverser.traverse(&scheduler, &run)?;

        self.passes += 1;
        info!(pass = pass_id, kind = %pass, "pass finished");
        Ok(())
    }

    fn freeze(&mut self) -> (Arc<Scheduler>, Arc<SystemTable<C>>) {
        if let Some(frozen) = &self.frozen {
            return (Arc::clone(&frozen.scheduler), Arc::clone(&frozen.systems));
        }

        let (topology, systems) = self.root.freeze();
        info!(
            systems = topology.len(),
            roots = topology.roots().len(),
            affinities = topology.affinities().count(),
            "graph frozen"
        );

        for (name, capacity) in std::mem::take(&mut self.named_capacities) {
            self.apply_named_capacity(&name, capacity);
        }

        let frozen = Frozen {
            scheduler: Arc::new(Scheduler::new(topology)),
            systems: Arc::new(SystemTable::new(systems)),
        };
        let handles = (Arc::clone(&frozen.scheduler), Arc::clone(&frozen.systems));
        self.frozen = Some(frozen);
        handles
    }

    fn apply_named_capacity(&mut self, name: &str, capacity: usize) {
        let tags = self.registry().affinities_named(name);
        if tags.is_empty() {
            warn!(affinity = name, capacity, "no affinity with this name is registered");
            return;
        }
        for tag in tags {
            self.traverser.set_capacity(tag, capacity);
        }
    }
}
