// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::TraverserKind;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// traverser = "concurrent"
///
/// [pool]
/// default_capacity = 4
///
/// [pool.affinity]
/// render = 1
/// ```
///
/// All keys are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub traverser: TraverserKind,

    #[serde(default)]
    pub pool: PoolSection,
}

/// `[pool]` section: worker capacities for the concurrent traverser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSection {
    /// Capacity of the default affinity. `None` keeps the built-in default.
    #[serde(default)]
    pub default_capacity: Option<usize>,

    /// Capacity per affinity display name.
    #[serde(default)]
    pub affinity: BTreeMap<String, usize>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub traverser: TraverserKind,
    pub pool: PoolSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(traverser: TraverserKind, pool: PoolSection) -> Self {
        Self { traverser, pool }
    }
}
