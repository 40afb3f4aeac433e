// src/config/validate.rs

use crate::config::model::{ConfigFile, PoolSection, RawConfigFile};
use crate::errors::{Result, SysgraphError};
use crate::registry::DEFAULT_AFFINITY_NAME;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SysgraphError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_pool(&raw.pool)?;
        Ok(ConfigFile::new_unchecked(raw.traverser, raw.pool))
    }
}

fn validate_pool(pool: &PoolSection) -> Result<()> {
    if pool.default_capacity == Some(0) {
        return Err(SysgraphError::ConfigError(
            "[pool].default_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    for (name, capacity) in pool.affinity.iter() {
        if name.trim().is_empty() {
            return Err(SysgraphError::ConfigError(
                "[pool.affinity] contains an empty affinity name".to_string(),
            ));
        }
        if name == DEFAULT_AFFINITY_NAME {
            return Err(SysgraphError::ConfigError(format!(
                "[pool.affinity].{name} is not allowed; use [pool].default_capacity instead"
            )));
        }
        if *capacity == 0 {
            return Err(SysgraphError::ConfigError(format!(
                "[pool.affinity].{name} must be >= 1 (got 0)"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn raw(default_capacity: Option<usize>, affinity: &[(&str, usize)]) -> RawConfigFile {
        RawConfigFile {
            pool: PoolSection {
                default_capacity,
                affinity: affinity
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect::<BTreeMap<_, _>>(),
            },
            ..RawConfigFile::default()
        }
    }

    fn message(raw: RawConfigFile) -> String {
        match ConfigFile::try_from(raw) {
            Err(SysgraphError::ConfigError(msg)) => msg,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_positive_capacities() {
        let cfg = ConfigFile::try_from(raw(Some(8), &[("render", 1)])).expect("valid");
        assert_eq!(cfg.pool.default_capacity, Some(8));
    }

    #[test]
    fn rejects_zero_default_capacity() {
        assert!(message(raw(Some(0), &[])).contains("default_capacity"));
    }

    #[test]
    fn rejects_zero_affinity_capacity() {
        assert!(message(raw(None, &[("render", 0)])).contains("render"));
    }

    #[test]
    fn rejects_default_in_affinity_table() {
        assert!(message(raw(None, &[("default", 2)])).contains("default_capacity"));
    }

    #[test]
    fn rejects_blank_affinity_name() {
        assert!(message(raw(None, &[(" ", 2)])).contains("empty affinity name"));
    }
}
