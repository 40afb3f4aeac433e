mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use sysgraph::{Pass, TraverserKind};
use sysgraph_test_utils::{Probe, ProbeLog};

use common::{isolated_runtime, unit};

/// Random acyclic graphs: node `i` may only depend on nodes `< i`.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_nodes).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        if i == 0 {
                            BTreeSet::new()
                        } else {
                            deps.into_iter().map(|d| d % i).collect()
                        }
                    })
                    .collect()
            },
        )
    })
}

fn run_dag(kind: TraverserKind, dag: &[BTreeSet<usize>], render_every: usize) -> Arc<ProbeLog> {
    let mut runtime = isolated_runtime(kind);
    let registry = runtime.registry().clone();
    let render = registry.affinity_named("render");
    let log = ProbeLog::new();
    let name = |i: usize| format!("n{i}");

    for (i, deps) in dag.iter().enumerate() {
        let tag = registry.system_named(&name(i));
        let mut builder = runtime.add_node(tag, Probe::new(&name(i), &log));
        if render_every > 0 && i % render_every == 0 {
            builder = builder.with_affinity_fn(render, || sysgraph::exec::DefaultAffinity);
        }
        let mut deps = deps.iter();
        if let Some(first) = deps.next() {
            deps.fold(
                builder.depends_on_tag(registry.system_named(&name(*first))),
                |chain, d| chain.and_tag(registry.system_named(&name(*d))),
            );
        }
    }

    runtime.configure(&unit()).unwrap();
    runtime.update(&unit()).unwrap();
    log
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_system_runs_once_after_its_dependencies(
        dag in dag_strategy(12),
        render_every in 0..4usize,
    ) {
        for kind in [TraverserKind::Sequential, TraverserKind::Concurrent] {
            let log = run_dag(kind, &dag, render_every);

            for i in 0..dag.len() {
                let name = format!("n{i}");
                prop_assert_eq!(log.starts(&name, Pass::Configure), 1);
                prop_assert_eq!(log.starts(&name, Pass::Update), 1);
            }

            let names: Vec<(String, String)> = dag
                .iter()
                .enumerate()
                .flat_map(|(i, deps)| deps.iter().map(move |d| (format!("n{d}"), format!("n{i}"))))
                .collect();
            let edges: Vec<(&str, &str)> =
                names.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
            log.assert_ordered(&edges);
        }
    }
}
