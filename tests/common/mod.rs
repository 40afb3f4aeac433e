#![allow(dead_code)]

use std::sync::Arc;

use sysgraph::exec::make_traverser;
use sysgraph::{Runtime, TagRegistry, TraverserKind};

pub use sysgraph_test_utils::init_tracing;

/// Nodes {A..F} with C<-A, D<-B, D<-C, F<-C, F<-E.
pub const SCENARIO: &[(&str, &[&str])] = &[
    ("A", &[]),
    ("B", &[]),
    ("C", &["A"]),
    ("D", &["B", "C"]),
    ("E", &[]),
    ("F", &["C", "E"]),
];

/// `(before, after)` pairs implied by [`SCENARIO`].
pub const SCENARIO_EDGES: &[(&str, &str)] = &[
    ("A", "C"),
    ("B", "D"),
    ("C", "D"),
    ("C", "F"),
    ("E", "F"),
];

/// Runtime on its own registry so tests don't share tags.
pub fn isolated_runtime(kind: TraverserKind) -> Runtime<()> {
    init_tracing();
    Runtime::with_traverser(Arc::new(TagRegistry::new()), make_traverser(kind))
}

pub fn unit() -> Arc<()> {
    Arc::new(())
}
