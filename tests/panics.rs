mod common;

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use common::{isolated_runtime, unit};
use sysgraph::{Affinity, Pass, TraverserKind};
use sysgraph_test_utils::{Probe, ProbeLog};

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => payload
            .downcast::<&'static str>()
            .map(|s| s.to_string())
            .unwrap_or_default(),
    }
}

/// `boom` panics on update; `after` depends on it, `side` is independent.
fn build(kind: TraverserKind) -> (sysgraph::Runtime<()>, std::sync::Arc<ProbeLog>) {
    let mut runtime = isolated_runtime(kind);
    let registry = runtime.registry().clone();
    let log = ProbeLog::new();

    let boom = registry.system_named("boom");
    runtime.add_node(boom, Probe::new("boom", &log).panicking());
    runtime
        .add_node(registry.system_named("after"), Probe::new("after", &log))
        .depends_on_tag(boom);
    runtime.add_node(registry.system_named("side"), Probe::new("side", &log));
    (runtime, log)
}

#[test]
fn concurrent_panic_is_reraised_after_pass_completes() {
    let (mut runtime, log) = build(TraverserKind::Concurrent);

    let result = panic::catch_unwind(AssertUnwindSafe(|| runtime.update(&unit())));
    let payload = result.expect_err("behavior panic must reach the caller");
    assert_eq!(panic_message(payload), "probe boom failed");

    // The failed system still counts as finished.
    assert_eq!(log.starts("after", Pass::Update), 1);
    assert_eq!(log.starts("side", Pass::Update), 1);
    assert_eq!(runtime.pass_count(), 0);

    runtime.configure(&unit()).unwrap();
    assert_eq!(runtime.pass_count(), 1);
    assert_eq!(log.starts("boom", Pass::Configure), 1);
    assert_eq!(log.starts("after", Pass::Configure), 1);
}

#[test]
fn sequential_panic_propagates_directly() {
    let (mut runtime, log) = build(TraverserKind::Sequential);

    let result = panic::catch_unwind(AssertUnwindSafe(|| runtime.update(&unit())));
    let payload = result.expect_err("behavior panic must reach the caller");
    assert_eq!(panic_message(payload), "probe boom failed");
    assert_eq!(log.starts("after", Pass::Update), 0);

    // The next pass starts from a clean slate and recovers the behavior.
    runtime.configure(&unit()).unwrap();
    for name in ["boom", "after", "side"] {
        assert_eq!(log.starts(name, Pass::Configure), 1, "{name}");
    }
}

/// Context whose `init` hook always panics.
struct BrokenContext;

impl Affinity for BrokenContext {
    fn init(&mut self) {
        panic!("context init failed");
    }
}

#[test]
fn concurrent_init_panic_fails_the_pass_instead_of_hanging() {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut runtime = isolated_runtime(TraverserKind::Concurrent);
        let registry = runtime.registry().clone();
        let log = ProbeLog::new();

        let gl = registry.affinity_named("gl");
        let drawn = registry.system_named("drawn");
        runtime
            .add_node(drawn, Probe::new("drawn", &log))
            .with_affinity_fn(gl, || BrokenContext);
        runtime
            .add_node(registry.system_named("after"), Probe::new("after", &log))
            .depends_on_tag(drawn);

        let first = panic::catch_unwind(AssertUnwindSafe(|| runtime.update(&unit())))
            .map_err(panic_message);
        // The broken worker is retired, so the next pass tries a fresh one.
        let second = panic::catch_unwind(AssertUnwindSafe(|| runtime.update(&unit())))
            .map_err(panic_message);
        let _ = tx.send((
            first.err(),
            second.err(),
            log.starts("drawn", Pass::Update),
            log.starts("after", Pass::Update),
        ));
    });

    let (first, second, drawn, after) = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("pass with a failing context must finish");
    assert_eq!(first.as_deref(), Some("context init failed"));
    assert_eq!(second.as_deref(), Some("context init failed"));
    // The bound system never ran; its dependent still did, once per pass.
    assert_eq!(drawn, 0);
    assert_eq!(after, 2);
}

#[test]
fn sequential_init_panic_propagates_directly() {
    let mut runtime = isolated_runtime(TraverserKind::Sequential);
    let registry = runtime.registry().clone();
    let log = ProbeLog::new();
    let gl = registry.affinity_named("gl");
    runtime
        .add_node(registry.system_named("drawn"), Probe::new("drawn", &log))
        .with_affinity_fn(gl, || BrokenContext);

    let result = panic::catch_unwind(AssertUnwindSafe(|| runtime.update(&unit())));
    let payload = result.expect_err("init panic must reach the caller");
    assert_eq!(panic_message(payload), "context init failed");
    assert_eq!(log.starts("drawn", Pass::Update), 0);
}
