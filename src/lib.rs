// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod demo;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod registry;
pub mod types;

pub use dag::{Group, System, Topology};
pub use engine::{Pass, Runtime};
pub use exec::{Affinity, ConcurrentTraverser, SequentialTraverser, Traverser};
pub use registry::{AffinityTag, Tag, TagRegistry};
pub use types::TraverserKind;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (explicit `--config`, else `Sysgraph.toml` if present)
/// - the demo graph
/// - the configure pass and `--passes` update passes
pub fn run(args: CliArgs) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let kind = args.traverser.unwrap_or(cfg.traverser);

    let mut runtime = demo::build(kind, &cfg.pool);

    if args.dry_run {
        print_dry_run(&runtime, &cfg, kind);
        return Ok(());
    }

    demo::run(&mut runtime, args.passes)?;
    Ok(())
}

fn load_config(explicit: Option<&str>) -> Result<ConfigFile> {
    let path = match explicit {
        Some(path) => PathBuf::from(path),
        None => {
            let path = default_config_path();
            if !path.exists() {
                debug!(path = %path.display(), "no config file; using defaults");
                return Ok(ConfigFile::default());
            }
            path
        }
    };

    load_and_validate(&path).with_context(|| format!("loading {}", path.display()))
}

/// Print the traverser, pool settings and graph without running a pass.
fn print_dry_run(runtime: &Runtime<demo::DemoWorld>, cfg: &ConfigFile, kind: TraverserKind) {
    println!("sysgraph dry-run");
    println!("  traverser = {kind}");
    if let Some(capacity) = cfg.pool.default_capacity {
        println!("  pool.default_capacity = {capacity}");
    }
    for (name, capacity) in cfg.pool.affinity.iter() {
        println!("  pool.affinity.{name} = {capacity}");
    }
    println!();
    print!("{}", runtime.topology().describe());

    debug!("dry-run complete (no execution)");
}
