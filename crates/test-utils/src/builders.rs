use std::collections::BTreeMap;

use sysgraph::config::{ConfigFile, PoolSection, RawConfigFile};
use sysgraph::TraverserKind;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                traverser: TraverserKind::default(),
                pool: PoolSection {
                    default_capacity: None,
                    affinity: BTreeMap::new(),
                },
            },
        }
    }

    pub fn traverser(mut self, kind: TraverserKind) -> Self {
        self.config.traverser = kind;
        self
    }

    pub fn default_capacity(mut self, capacity: usize) -> Self {
        self.config.pool.default_capacity = Some(capacity);
        self
    }

    pub fn affinity(mut self, name: &str, capacity: usize) -> Self {
        self.config.pool.affinity.insert(name.to_string(), capacity);
        self
    }

    /// The same settings as TOML, for loader tests.
    pub fn to_toml(&self) -> String {
        let mut out = format!("traverser = \"{}\"\n", self.config.traverser);
        out.push_str("\n[pool]\n");
        if let Some(capacity) = self.config.pool.default_capacity {
            out.push_str(&format!("default_capacity = {capacity}\n"));
        }
        if !self.config.pool.affinity.is_empty() {
            out.push_str("\n[pool.affinity]\n");
            for (name, capacity) in &self.config.pool.affinity {
                out.push_str(&format!("{name} = {capacity}\n"));
            }
        }
        out
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
