// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::TraverserKind;

/// Command-line arguments for the `sysgraph` demo binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sysgraph",
    version,
    about = "Run a demo graph of systems through the sysgraph scheduler.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Sysgraph.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Traversal strategy (sequential, concurrent). Overrides the config file.
    #[arg(long, value_name = "KIND")]
    pub traverser: Option<TraverserKind>,

    /// Number of update passes to run after the configure pass.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub passes: u32,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SYSGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Build the graph and print it, but don't run any pass.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["sysgraph"]).expect("parse");
        assert_eq!(args.config, None);
        assert_eq!(args.traverser, None);
        assert_eq!(args.passes, 1);
        assert!(!args.dry_run);
    }

    #[test]
    fn parses_traverser_and_passes() {
        let args = CliArgs::try_parse_from([
            "sysgraph",
            "--traverser",
            "sequential",
            "--passes",
            "3",
            "--dry-run",
        ])
        .expect("parse");
        assert_eq!(args.traverser, Some(TraverserKind::Sequential));
        assert_eq!(args.passes, 3);
        assert!(args.dry_run);
    }

    #[test]
    fn rejects_unknown_traverser() {
        assert!(CliArgs::try_parse_from(["sysgraph", "--traverser", "gpu"]).is_err());
    }
}
