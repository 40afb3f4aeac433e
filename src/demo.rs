// src/demo.rs

//! Demo graph run by the `sysgraph` binary.
//!
//! ```text
//!      ----------
//! A -> | B -> D | \
//!      | C      |  \
//!      ----------   -> F
//!                  /
//! E --------------/
//! ```
//!
//! `A` runs on the `worker` affinity, the `{B, C, D}` group on `render`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::config::model::PoolSection;
use crate::dag::{Group, System};
use crate::engine::Runtime;
use crate::errors::Result;
use crate::exec::{make_traverser, Affinity};
use crate::registry::TagRegistry;
use crate::types::TraverserKind;

/// Context shared by the demo systems.
#[derive(Debug, Default)]
pub struct DemoWorld {
    runs: AtomicU64,
}

impl DemoWorld {
    /// Total number of behaviors invoked so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    fn record(&self, system: &str, pass: &str) {
        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        info!(system, pass, run, "system ran");
    }
}

macro_rules! demo_system {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Debug, Default)]
            pub struct $name;

            impl System<DemoWorld> for $name {
                fn configure(&mut self, world: &DemoWorld) {
                    world.record(stringify!($name), "configure");
                }

                fn update(&mut self, world: &DemoWorld) {
                    world.record(stringify!($name), "update");
                }
            }
        )*
    };
}

demo_system!(A, B, C, D, E, F);

/// Background work context.
#[derive(Debug, Default)]
pub struct WorkerThread;

impl Affinity for WorkerThread {
    fn name() -> &'static str {
        "worker"
    }

    fn init(&mut self) {
        info!(affinity = "worker", "context initialised");
    }

    fn teardown(&mut self) {
        info!(affinity = "worker", "context torn down");
    }
}

/// Stand-in for a context that owns a rendering API.
#[derive(Debug, Default)]
pub struct RenderThread;

impl Affinity for RenderThread {
    fn name() -> &'static str {
        "render"
    }

    fn init(&mut self) {
        info!(affinity = "render", "context initialised");
    }

    fn teardown(&mut self) {
        info!(affinity = "render", "context torn down");
    }
}

/// Build the demo runtime. `pool` overrides the built-in capacities.
pub fn build(kind: TraverserKind, pool: &PoolSection) -> Runtime<DemoWorld> {
    let mut runtime =
        Runtime::with_traverser(TagRegistry::global(), make_traverser(kind));

    runtime.add_system::<A>().with_affinity::<WorkerThread>();

    let mut render = Group::with_registry(Arc::clone(runtime.registry()));
    render.add_system::<B>();
    render.add_system::<C>();
    render.add_system::<D>().depends_on::<B>();
    runtime
        .add_group(&mut render)
        .with_affinity::<RenderThread>()
        .depends_on::<A>();

    runtime.add_system::<E>();
    runtime
        .add_system::<F>()
        .depends_on_group(&render)
        .and::<E>();

    runtime.set_default_capacity(4);
    runtime.set_capacity::<WorkerThread>(2);
    runtime.set_capacity::<RenderThread>(1);
    runtime.apply_pool(pool);
    runtime
}

/// One configure pass followed by `passes` update passes.
pub fn run(runtime: &mut Runtime<DemoWorld>, passes: u32) -> Result<Arc<DemoWorld>> {
    let world = Arc::new(DemoWorld::default());
    runtime.configure(&world)?;
    for _ in 0..passes {
        runtime.update(&world)?;
    }
    info!(
        passes = runtime.pass_count(),
        runs = world.runs(),
        "demo finished"
    );
    Ok(world)
}
