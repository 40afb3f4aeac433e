// src/exec/worker.rs

//! One dedicated thread bound to an affinity.
//!
//! A worker owns its affinity context: `init` runs on the worker thread
//! before the first task, `teardown` after the task channel is closed. Tasks
//! arrive one at a time over a private channel; each finished task is
//! announced on the completion channel shared by all workers, which is what
//! the dispatcher blocks on.
//!
//! If `init` panics the worker never runs a behavior. Every task it receives
//! is reported back as failed with the init panic, and the dispatcher retires
//! the worker.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::exec::affinity::Affinity;
use crate::registry::{AffinityTag, Tag};

/// A unit of work posted to a worker; yields the behavior's panic, if any.
pub(crate) type Task = Box<dyn FnOnce() -> thread::Result<()> + Send>;

/// What a worker receives: the system to run and the pass it belongs to.
pub(crate) struct Job {
    pub tag: Tag,
    pub pass: u64,
    pub task: Task,
}

/// Sent by a worker after each job.
pub(crate) struct Completion {
    pub affinity: AffinityTag,
    pub worker: usize,
    pub tag: Tag,
    pub pass: u64,
    pub outcome: thread::Result<()>,
    /// The worker's context failed to initialise; it will run nothing.
    pub context_failed: bool,
}

pub(crate) struct Worker {
    id: usize,
    name: String,
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
    busy: bool,
}

impl Worker {
    /// Start the worker thread. `context.init()` runs on the new thread.
    pub fn spawn(
        affinity: AffinityTag,
        affinity_name: &str,
        id: usize,
        mut context: Box<dyn Affinity>,
        done_tx: Sender<Completion>,
    ) -> io::Result<Self> {
        let (tx, rx): (Sender<Job>, Receiver<Job>) = mpsc::channel();
        let name = format!("sysgraph-{affinity_name}-{id}");
        let label = affinity_name.to_string();

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| context.init())) {
                error!(worker = id, affinity = %label, "affinity context panicked in init");
                fail_jobs(affinity, &label, id, &rx, &done_tx, payload);
                return;
            }
            debug!(worker = id, %affinity, "worker started");

            while let Ok(Job { tag, pass, task }) = rx.recv() {
                let outcome = task();
                let completion = Completion {
                    affinity,
                    worker: id,
                    tag,
                    pass,
                    outcome,
                    context_failed: false,
                };
                if done_tx.send(completion).is_err() {
                    break;
                }
            }

            context.teardown();
            debug!(worker = id, %affinity, "worker stopped");
        })?;

        info!(worker = %name, "spawned worker thread");
        Ok(Self {
            id,
            name,
            tx: Some(tx),
            handle: Some(handle),
            busy: false,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_idle(&self) -> bool {
        !self.busy
    }

    /// Hand `job` to this worker.
    ///
    /// Gives the job back if the worker thread is gone.
    pub fn post(&mut self, job: Job) -> Result<(), Job> {
        debug_assert!(!self.busy, "worker holds at most one task");
        let Some(tx) = self.tx.as_ref() else {
            return Err(job);
        };
        match tx.send(job) {
            Ok(()) => {
                self.busy = true;
                Ok(())
            }
            Err(mpsc::SendError(job)) => {
                error!(worker = %self.name, "worker thread is gone; dropping it from the pool");
                self.tx = None;
                Err(job)
            }
        }
    }

    pub fn mark_idle(&mut self) {
        self.busy = false;
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the channel is the stop request.
        self.tx.take();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.join() {
                error!(worker = %self.name, "worker thread panicked: {:?}", e);
            } else {
                debug!(worker = %self.name, "worker thread joined");
            }
        }
    }
}

/// Report every job as failed until the worker is dropped.
///
/// The first job carries the init panic itself; payloads cannot be cloned,
/// so any later one gets a message naming the affinity.
fn fail_jobs(
    affinity: AffinityTag,
    affinity_name: &str,
    id: usize,
    rx: &Receiver<Job>,
    done_tx: &Sender<Completion>,
    payload: Box<dyn Any + Send>,
) {
    let mut payload = Some(payload);
    while let Ok(Job { tag, pass, .. }) = rx.recv() {
        let cause = payload.take().unwrap_or_else(|| {
            Box::new(format!("affinity '{affinity_name}' failed to initialise"))
        });
        let completion = Completion {
            affinity,
            worker: id,
            tag,
            pass,
            outcome: Err(cause),
            context_failed: true,
        };
        if done_tx.send(completion).is_err() {
            break;
        }
    }
}
