// src/dag/mod.rs

//! Dependency graph and pass scheduling.
//!
//! - [`tag_set`] is the fixed-width bitset used for dependency masks.
//! - [`node`] defines the [`System`] trait and per-node metadata.
//! - [`graph`] holds [`Group`] (the mutable builder container) and
//!   [`Topology`] (its frozen, shareable form).
//! - [`builder`] is the fluent edge/affinity declaration surface.
//! - [`scheduler`] contains the per-pass state machine that decides which
//!   systems are ready to run.
//! - [`next`] defines the result type for drawing from the ready set.

pub mod builder;
pub mod graph;
pub mod next;
pub mod node;
pub mod scheduler;
pub mod tag_set;

pub use builder::{ChainBuilder, EdgeBuilder};
pub use graph::{AffinityEntry, Group, Topology};
pub use next::Next;
pub use node::{NodeInfo, System};
pub use scheduler::Scheduler;
pub use tag_set::{TagSet, MAX_NODES};
