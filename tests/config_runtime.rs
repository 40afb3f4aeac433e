mod common;

use std::fs;

use clap::Parser;
use sysgraph::cli::CliArgs;
use sysgraph::config::load_and_validate;
use sysgraph::errors::SysgraphError;
use sysgraph::{Runtime, TraverserKind};
use sysgraph_test_utils::ConfigFileBuilder;

#[test]
fn builder_toml_round_trips_through_loader() {
    common::init_tracing();
    let builder = ConfigFileBuilder::new()
        .traverser(TraverserKind::Sequential)
        .default_capacity(3)
        .affinity("render", 1);
    let toml = builder.to_toml();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Sysgraph.toml");
    fs::write(&path, &toml).unwrap();

    let loaded = load_and_validate(&path).unwrap();
    assert_eq!(loaded, builder.build());
}

#[test]
fn runtime_from_config_uses_configured_traverser() {
    let cfg = ConfigFileBuilder::new()
        .traverser(TraverserKind::Sequential)
        .affinity("render", 2)
        .build();
    let runtime = Runtime::<()>::from_config(&cfg);
    assert_eq!(runtime.traverser_kind(), TraverserKind::Sequential);

    let runtime = Runtime::<()>::from_config(&ConfigFileBuilder::new().build());
    assert_eq!(runtime.traverser_kind(), TraverserKind::Concurrent);
}

#[test]
fn zero_capacity_in_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Sysgraph.toml");
    fs::write(&path, "[pool.affinity]\nrender = 0\n").unwrap();

    let err = load_and_validate(&path).unwrap_err();
    match err {
        SysgraphError::ConfigError(msg) => assert!(msg.contains("render"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn dry_run_with_config_file_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(
        &path,
        ConfigFileBuilder::new().affinity("render", 1).to_toml(),
    )
    .unwrap();

    let path = path.to_string_lossy().to_string();
    let args = CliArgs::try_parse_from(["sysgraph", "--config", &path, "--dry-run"]).unwrap();
    sysgraph::run(args).unwrap();
}

#[test]
fn demo_runs_on_both_traversers() {
    common::init_tracing();
    for kind in ["sequential", "concurrent"] {
        let args =
            CliArgs::try_parse_from(["sysgraph", "--traverser", kind, "--passes", "2"]).unwrap();
        sysgraph::run(args).unwrap();
    }
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml").to_string_lossy().to_string();
    let args = CliArgs::try_parse_from(["sysgraph", "--config", &path]).unwrap();

    let err = sysgraph::run(args).unwrap_err();
    assert!(format!("{err:#}").contains("absent.toml"), "{err:#}");
}
