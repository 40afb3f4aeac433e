// src/exec/concurrent.rs

//! Multi-threaded traversal over per-affinity worker pools.
//!
//! The calling thread acts as the dispatcher. Each round it drains the
//! scheduler's ready set, posting every drawn system to an idle worker of
//! its affinity (spawning a new worker while the pool is below capacity).
//! Systems whose pool is saturated are deferred and requeued at the end of
//! the round. When nothing more can be dispatched the dispatcher blocks on
//! the shared completion channel until some worker finishes. Only the
//! dispatcher marks systems finished, on receiving their completion.

use std::any::Any;
use std::collections::BTreeMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use tracing::{debug, error, info, trace};

use crate::dag::{Next, Scheduler};
use crate::errors::{Result, SysgraphError};
use crate::exec::affinity::{Affinity, DefaultAffinity};
use crate::exec::worker::{Completion, Job, Task, Worker};
use crate::registry::{AffinityTag, Tag};
use crate::types::TraverserKind;

use super::traverser::{stall, RunFn, Traverser};

type Panic = Box<dyn Any + Send>;

/// Worker cap for the default affinity unless configured otherwise.
pub const DEFAULT_POOL_CAPACITY: usize = 4;

/// Worker cap for every other affinity unless configured otherwise.
pub const CUSTOM_POOL_CAPACITY: usize = 1;

pub struct ConcurrentTraverser {
    pools: BTreeMap<AffinityTag, Vec<Worker>>,
    capacities: BTreeMap<AffinityTag, usize>,
    done_tx: Sender<Completion>,
    done_rx: Receiver<Completion>,
    in_flight: usize,
    next_worker_id: usize,
}

impl ConcurrentTraverser {
    pub fn new() -> Self {
        let (done_tx, done_rx) = mpsc::channel();
        Self {
            pools: BTreeMap::new(),
            capacities: BTreeMap::new(),
            done_tx,
            done_rx,
            in_flight: 0,
            next_worker_id: 0,
        }
    }

    /// Effective worker cap for `affinity`.
    pub fn capacity(&self, affinity: AffinityTag) -> usize {
        match self.capacities.get(&affinity) {
            Some(cap) => *cap,
            None if affinity.is_default() => DEFAULT_POOL_CAPACITY,
            None => CUSTOM_POOL_CAPACITY,
        }
    }

    /// Number of live workers currently pooled for `affinity`.
    pub fn worker_count(&self, affinity: AffinityTag) -> usize {
        self.pools.get(&affinity).map(Vec::len).unwrap_or(0)
    }

    /// Try to hand `tag` to a worker. Returns `false` if its pool is saturated.
    fn dispatch(&mut self, tag: Tag, scheduler: &Arc<Scheduler>, run: &RunFn) -> Result<bool> {
        let topology = Arc::clone(scheduler.topology());
        let affinity = topology.affinity_of(tag);
        let capacity = self.capacity(affinity);
        let pool = self.pools.entry(affinity).or_default();

        let busy = pool.iter().filter(|w| !w.is_idle()).count();
        if busy >= capacity {
            trace!(%tag, %affinity, busy, capacity, "affinity pool saturated");
            return Ok(false);
        }

        let mut job = Job {
            tag,
            pass: scheduler.pass_id(),
            task: make_task(tag, run),
        };

        // Reuse an idle worker; drop any whose thread has died.
        let mut index = 0;
        while index < pool.len() {
            if !pool[index].is_idle() {
                index += 1;
                continue;
            }
            match pool[index].post(job) {
                Ok(()) => {
                    trace!(%tag, worker = pool[index].id(), "posted system to idle worker");
                    self.in_flight += 1;
                    return Ok(true);
                }
                Err(returned) => {
                    job = returned;
                    pool.remove(index);
                }
            }
        }

        if pool.len() >= capacity {
            return Ok(false);
        }

        let name = topology.affinity_name(affinity);
        let context = match topology.affinity(affinity) {
            Some(entry) => (entry.factory)(),
            None => Box::new(DefaultAffinity) as Box<dyn Affinity>,
        };
        let id = self.next_worker_id;
        self.next_worker_id += 1;

        let mut worker = Worker::spawn(affinity, &name, id, context, self.done_tx.clone())
            .map_err(|source| SysgraphError::WorkerSpawn {
                affinity: name.clone(),
                source,
            })?;
        debug!(
            affinity = %name,
            workers = pool.len() + 1,
            capacity,
            "grew affinity pool"
        );

        if worker.post(job).is_err() {
            return Err(SysgraphError::WorkerSpawn {
                affinity: name,
                source: io::Error::other("worker thread exited before its first task"),
            });
        }
        pool.push(worker);
        self.in_flight += 1;
        Ok(true)
    }

    /// Block until one worker reports a finished task.
    fn wait_for_completion(&mut self, scheduler: &Scheduler, panicked: &mut Option<Panic>) {
        // `done_tx` lives in `self`, so the channel never disconnects here.
        if let Ok(completion) = self.done_rx.recv() {
            self.on_completion(completion, scheduler, panicked);
        }
    }

    fn drain_completions(&mut self, scheduler: &Scheduler, panicked: &mut Option<Panic>) {
        while let Ok(completion) = self.done_rx.try_recv() {
            self.on_completion(completion, scheduler, panicked);
        }
    }

    fn on_completion(
        &mut self,
        completion: Completion,
        scheduler: &Scheduler,
        panicked: &mut Option<Panic>,
    ) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let Some(pool) = self.pools.get_mut(&completion.affinity) {
            if let Some(index) = pool.iter().position(|w| w.id() == completion.worker) {
                if completion.context_failed {
                    // Dropping closes the channel and joins the thread.
                    pool.remove(index);
                    debug!(worker = completion.worker, "retired worker with failed context");
                } else {
                    pool[index].mark_idle();
                }
            }
        }

        // Left over from a pass that returned early.
        if completion.pass != scheduler.pass_id() {
            debug!(tag = %completion.tag, pass = completion.pass, "discarding stale completion");
            return;
        }

        if let Err(payload) = completion.outcome {
            error!(
                tag = %completion.tag,
                worker = completion.worker,
                "system panicked on worker thread"
            );
            if panicked.is_none() {
                *panicked = Some(payload);
            }
        }
        scheduler.mark_finished(completion.tag);
    }
}

impl Default for ConcurrentTraverser {
    fn default() -> Self {
        Self::new()
    }
}

impl Traverser for ConcurrentTraverser {
    fn traverse(&mut self, scheduler: &Arc<Scheduler>, run: &RunFn) -> Result<()> {
        let mut panicked = None;
        self.drain_completions(scheduler, &mut panicked);

        loop {
            let mut deferred = Vec::new();
            let finished = loop {
                match scheduler.take_ready() {
                    Next::Ready(tag) => {
                        if !self.dispatch(tag, scheduler, run)? {
                            deferred.push(tag);
                        }
                    }
                    Next::Blocked => break false,
                    Next::Finished => break true,
                }
            };

            if !deferred.is_empty() {
                debug!(count = deferred.len(), "requeueing systems with saturated affinity");
                for tag in deferred {
                    scheduler.requeue(tag);
                }
            }

            if finished {
                break;
            }
            if self.in_flight == 0 {
                stall(scheduler);
            }

            self.wait_for_completion(scheduler, &mut panicked);
            self.drain_completions(scheduler, &mut panicked);
        }

        // Completions from an earlier pass may still be outstanding.
        while self.in_flight > 0 {
            self.wait_for_completion(scheduler, &mut panicked);
        }

        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
        Ok(())
    }

    fn set_capacity(&mut self, affinity: AffinityTag, capacity: usize) {
        debug!(%affinity, capacity, "setting worker capacity");
        self.capacities.insert(affinity, capacity);
    }

    fn kind(&self) -> TraverserKind {
        TraverserKind::Concurrent
    }
}

impl Drop for ConcurrentTraverser {
    fn drop(&mut self) {
        let workers: usize = self.pools.values().map(Vec::len).sum();
        // Dropping each worker closes its channel and joins its thread.
        self.pools.clear();
        info!(workers, "concurrent traverser disposed");
    }
}

/// Wrap `run(tag)` so a panicking behavior still yields a completion.
fn make_task(tag: Tag, run: &RunFn) -> Task {
    let run = Arc::clone(run);
    Box::new(move || panic::catch_unwind(AssertUnwindSafe(|| run(tag))))
}
