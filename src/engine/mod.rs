// src/engine/mod.rs

//! Runtime that drives passes over a frozen graph.
//!
//! - [`runtime`] owns the root group, the pass scheduler and the traverser,
//!   and exposes the `configure`/`update` entry points.
//! - [`systems`] holds the behaviors once the graph is frozen.

use std::fmt;

pub mod runtime;
pub mod systems;

pub use runtime::Runtime;
pub use systems::SystemTable;

/// Which behavior a pass invokes on every system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Configure,
    Update,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Configure => f.write_str("configure"),
            Pass::Update => f.write_str("update"),
        }
    }
}
