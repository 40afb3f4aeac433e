// src/exec/affinity.rs

//! Execution contexts that systems can be pinned to.
//!
//! An affinity is a kind of context, e.g. "the thread that owns the GL
//! context". Traversers create affinity instances lazily through an
//! [`AffinityFactory`]: the sequential traverser keeps one instance per
//! affinity, the concurrent traverser one per worker thread. `init` runs once
//! when an instance comes to life (on the worker's own thread for the
//! concurrent traverser) and `teardown` once when it is disposed.

use std::sync::Arc;

use crate::registry::DEFAULT_AFFINITY_NAME;

pub trait Affinity: Send + 'static {
    /// Name used in logs and for matching `[pool.affinity]` config keys.
    fn name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }

    fn init(&mut self) {}

    fn teardown(&mut self) {}
}

/// Produces a fresh instance of one affinity.
pub type AffinityFactory = Arc<dyn Fn() -> Box<dyn Affinity> + Send + Sync>;

/// Factory for an affinity type constructible through `Default`.
pub fn factory_of<A: Affinity + Default>() -> AffinityFactory {
    Arc::new(|| Box::new(A::default()) as Box<dyn Affinity>)
}

/// The context systems run on when not bound anywhere else. Has no hooks.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAffinity;

impl Affinity for DefaultAffinity {
    fn name() -> &'static str {
        DEFAULT_AFFINITY_NAME
    }
}
