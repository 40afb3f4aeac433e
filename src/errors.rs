// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Two families live here:
//! - [`SysgraphError`], the recoverable errors (config loading, worker
//!   thread spawning) returned through [`Result`].
//! - [`GraphError`], the builder contract violations. These are never
//!   returned; [`violation`] turns them into a panic at the call site.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SysgraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("failed to spawn worker thread for affinity '{affinity}': {source}")]
    WorkerSpawn {
        affinity: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Structural misuse of the graph builder.
///
/// Each variant corresponds to one fail-fast check performed while a graph
/// is being declared.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("system '{name}' is already registered in this group")]
    DuplicateNode { name: String },

    #[error("group is frozen (merged or already in use); cannot {action}")]
    Frozen { action: &'static str },

    #[error("system '{dependent}' depends on '{dependency}', which is not in this group")]
    MissingDependency { dependent: String, dependency: String },

    #[error("system '{name}' cannot depend on itself")]
    SelfDependency { name: String },

    #[error("system '{dependent}' already depends on '{dependency}'")]
    DuplicateDependency { dependent: String, dependency: String },

    #[error("system '{name}' cannot depend on a group it belongs to")]
    DependentInGroup { name: String },

    #[error("depended-on group has not been merged into this group")]
    GroupNotMerged,

    #[error("system '{name}' is already bound to affinity '{affinity}'")]
    AffinityAlreadyBound { name: String, affinity: String },

    #[error("cannot merge an empty group")]
    MergeEmpty,

    #[error("cannot merge a group that is already frozen")]
    MergeFrozen,

    #[error("cannot merge groups with overlapping systems: {names:?}")]
    MergeOverlap { names: Vec<String> },

    #[error("groups were built against different tag registries")]
    RegistryMismatch,

    #[error("too many systems registered (limit is {limit})")]
    TooManyNodes { limit: usize },

    #[error("worker capacity for affinity '{affinity}' must be >= 1")]
    ZeroCapacity { affinity: String },

    #[error("affinity name '{name}' is reserved; use set_default_capacity instead")]
    ReservedAffinityName { name: String },
}

/// Abort on a builder contract violation, reporting the caller's location.
#[track_caller]
#[cold]
pub fn violation(err: GraphError) -> ! {
    panic!("sysgraph: {err}")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SysgraphError>;
