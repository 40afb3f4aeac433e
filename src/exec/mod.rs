// src/exec/mod.rs

//! Execution layer.
//!
//! This module turns a reset [`Scheduler`](crate::dag::Scheduler) into a
//! completed pass by running every system's behavior.
//!
//! - [`traverser`] provides the `Traverser` trait that the runtime drives,
//!   and which tests can replace with their own strategy.
//! - [`sequential`] runs systems one by one on the calling thread.
//! - [`concurrent`] dispatches systems to bounded per-affinity worker pools.
//! - [`worker`] owns a single worker thread and its affinity context.
//! - [`affinity`] defines execution contexts that systems can be bound to.

pub mod affinity;
pub mod concurrent;
pub mod sequential;
pub mod traverser;
mod worker;

pub use affinity::{factory_of, Affinity, AffinityFactory, DefaultAffinity};
pub use concurrent::{ConcurrentTraverser, CUSTOM_POOL_CAPACITY, DEFAULT_POOL_CAPACITY};
pub use sequential::SequentialTraverser;
pub use traverser::{make_traverser, RunFn, Traverser};
