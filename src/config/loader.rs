// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** check the
/// pool settings. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), "loaded config file");

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `Sysgraph.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Sysgraph.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SysgraphError;
    use crate::types::TraverserKind;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn loads_full_config() {
        let file = write_config(
            r#"
traverser = "sequential"

[pool]
default_capacity = 2

[pool.affinity]
render = 1
io = 3
"#,
        );

        let cfg = load_and_validate(file.path()).expect("valid config");
        assert_eq!(cfg.traverser, TraverserKind::Sequential);
        assert_eq!(cfg.pool.default_capacity, Some(2));
        assert_eq!(cfg.pool.affinity.get("render"), Some(&1));
        assert_eq!(cfg.pool.affinity.get("io"), Some(&3));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = write_config("");
        let cfg = load_and_validate(file.path()).expect("valid config");
        assert_eq!(cfg, ConfigFile::default());
        assert_eq!(cfg.traverser, TraverserKind::Concurrent);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_from_path(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, SysgraphError::IoError(_)), "got {err:?}");
    }

    #[test]
    fn unknown_traverser_is_toml_error() {
        let file = write_config(r#"traverser = "parallel""#);
        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, SysgraphError::TomlError(_)), "got {err:?}");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("[pool]\nmax_workers = 3\n");
        assert!(load_from_path(file.path()).is_err());
    }
}
