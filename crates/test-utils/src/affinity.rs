use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use sysgraph::Affinity;

/// Shared counters for every context built by one factory.
#[derive(Debug, Default)]
pub struct AffinityCounters {
    inits: AtomicUsize,
    teardowns: AtomicUsize,
    init_threads: Mutex<Vec<String>>,
}

impl AffinityCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    /// Names of the threads `init` ran on, in call order.
    pub fn init_threads(&self) -> Vec<String> {
        self.init_threads.lock().unwrap().clone()
    }
}

/// Affinity context that counts its lifecycle hooks.
pub struct RecordingAffinity {
    counters: Arc<AffinityCounters>,
}

impl RecordingAffinity {
    pub fn new(counters: &Arc<AffinityCounters>) -> Self {
        Self {
            counters: Arc::clone(counters),
        }
    }

    /// Factory closure for `EdgeBuilder::with_affinity_fn`.
    pub fn factory(counters: &Arc<AffinityCounters>) -> impl Fn() -> Self + Send + Sync + 'static {
        let counters = Arc::clone(counters);
        move || RecordingAffinity::new(&counters)
    }
}

impl Affinity for RecordingAffinity {
    fn init(&mut self) {
        self.counters.inits.fetch_add(1, Ordering::SeqCst);
        let name = thread::current().name().unwrap_or("<unnamed>").to_string();
        self.counters.init_threads.lock().unwrap().push(name);
    }

    fn teardown(&mut self) {
        self.counters.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}
