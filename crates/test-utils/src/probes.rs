use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use sysgraph::{Pass, Runtime, System, Tag};

/// One observation made by a [`Probe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    Started { name: String, pass: Pass, thread: String },
    Finished { name: String, pass: Pass },
}

/// Ordered record of probe events, shared by every probe of a test.
#[derive(Debug, Default)]
pub struct ProbeLog {
    events: Mutex<Vec<ProbeEvent>>,
}

impl ProbeLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ProbeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Names in the order they finished during `pass`.
    pub fn finish_order(&self, pass: Pass) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProbeEvent::Finished { name, pass: p } if p == pass => Some(name),
                _ => None,
            })
            .collect()
    }

    /// How many times `name` started during `pass`.
    pub fn starts(&self, name: &str, pass: Pass) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProbeEvent::Started { name: n, pass: p, .. } if n == name && *p == pass))
            .count()
    }

    /// Thread each system started on during `pass`.
    pub fn threads(&self, pass: Pass) -> BTreeMap<String, String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProbeEvent::Started { name, pass: p, thread } if p == pass => Some((name, thread)),
                _ => None,
            })
            .collect()
    }

    /// Panic unless, for every `(before, after)` pair, each `before`
    /// finished ahead of the matching `after` start of the same pass
    /// occurrence.
    ///
    /// Passes are split in the order they appear in the log, so running the
    /// same pass kind twice checks both runs independently.
    pub fn assert_ordered(&self, edges: &[(&str, &str)]) {
        for (index, run) in self.runs().iter().enumerate() {
            for (before, after) in edges {
                let finished = run.iter().position(
                    |e| matches!(e, ProbeEvent::Finished { name, .. } if name == before),
                );
                let started = run.iter().position(
                    |e| matches!(e, ProbeEvent::Started { name, .. } if name == after),
                );
                match (finished, started) {
                    (Some(f), Some(s)) => assert!(
                        f < s,
                        "run {index}: {after} started before {before} finished: {run:?}"
                    ),
                    _ => panic!("run {index}: {before} or {after} never ran: {run:?}"),
                }
            }
        }
    }

    /// Split the log into one slice per pass.
    ///
    /// A new run begins when a system starts a second time.
    fn runs(&self) -> Vec<Vec<ProbeEvent>> {
        let mut runs: Vec<Vec<ProbeEvent>> = vec![Vec::new()];
        let mut seen = BTreeSet::new();
        for event in self.events() {
            if let ProbeEvent::Started { name, .. } = &event {
                if !seen.insert(name.clone()) {
                    seen.clear();
                    seen.insert(name.clone());
                    runs.push(Vec::new());
                }
            }
            runs.last_mut().expect("at least one run").push(event);
        }
        runs.retain(|run| !run.is_empty());
        runs
    }

    fn push(&self, event: ProbeEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Tracks how many guarded sections are live at once and the peak.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    fn enter(&self) -> GaugeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard { gauge: self }
    }
}

struct GaugeGuard<'a> {
    gauge: &'a ConcurrencyGauge,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// System that records its start and finish into a [`ProbeLog`].
pub struct Probe {
    name: String,
    log: Arc<ProbeLog>,
    gauge: Option<Arc<ConcurrencyGauge>>,
    hold: Duration,
    panic_on_update: bool,
}

impl Probe {
    pub fn new(name: &str, log: &Arc<ProbeLog>) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            gauge: None,
            hold: Duration::ZERO,
            panic_on_update: false,
        }
    }

    /// Count this probe's executions in `gauge`.
    pub fn gauged(mut self, gauge: &Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(Arc::clone(gauge));
        self
    }

    /// Sleep for `hold` between start and finish.
    pub fn holding(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Panic in `update` after recording the start.
    pub fn panicking(mut self) -> Self {
        self.panic_on_update = true;
        self
    }

    fn observe(&mut self, pass: Pass) {
        let _guard = self.gauge.as_ref().map(|g| g.enter());
        let thread = thread::current().name().unwrap_or("<unnamed>").to_string();
        self.log.push(ProbeEvent::Started {
            name: self.name.clone(),
            pass,
            thread,
        });

        if !self.hold.is_zero() {
            thread::sleep(self.hold);
        }
        if pass == Pass::Update && self.panic_on_update {
            panic!("probe {} failed", self.name);
        }

        self.log.push(ProbeEvent::Finished {
            name: self.name.clone(),
            pass,
        });
    }
}

impl<C> System<C> for Probe {
    fn configure(&mut self, _ctx: &C) {
        self.observe(Pass::Configure);
    }

    fn update(&mut self, _ctx: &C) {
        self.observe(Pass::Update);
    }
}

/// Register one probe per `(name, dependencies)` entry, in order.
///
/// Dependencies must name earlier entries. Returns the allocated tags.
pub fn add_probes<C: Send + Sync + 'static>(
    runtime: &mut Runtime<C>,
    log: &Arc<ProbeLog>,
    nodes: &[(&str, &[&str])],
) -> Vec<Tag> {
    let registry = Arc::clone(runtime.registry());
    let mut tags = Vec::with_capacity(nodes.len());
    for (name, deps) in nodes {
        let tag = registry.system_named(name);
        let builder = runtime.add_node(tag, Probe::new(name, log));
        if let Some((first, rest)) = deps.split_first() {
            rest.iter().fold(
                builder.depends_on_tag(registry.system_named(first)),
                |chain, dep| chain.and_tag(registry.system_named(dep)),
            );
        }
        tags.push(tag);
    }
    tags
}
