// src/engine/systems.rs

use std::sync::{Mutex, PoisonError};

use tracing::{trace, warn};

use crate::dag::System;
use crate::registry::Tag;

use super::Pass;

/// Behaviors of a frozen graph, indexed by tag.
///
/// Each behavior sits behind its own mutex. The scheduler never hands the
/// same tag out twice in one pass, so these locks are never contended.
pub struct SystemTable<C> {
    slots: Vec<Option<Mutex<Box<dyn System<C>>>>>,
}

impl<C: 'static> SystemTable<C> {
    pub fn new(systems: Vec<Option<Box<dyn System<C>>>>) -> Self {
        Self {
            slots: systems.into_iter().map(|s| s.map(Mutex::new)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke the `pass` behavior of the system registered under `tag`.
    ///
    /// A behavior that panicked in an earlier pass is run again; its
    /// poisoned lock is recovered.
    pub fn run(&self, tag: Tag, pass: Pass, ctx: &C) {
        let Some(slot) = self.slots.get(tag.index()).and_then(Option::as_ref) else {
            warn!(%tag, "no behavior registered for system; skipping");
            return;
        };

        let mut system = slot.lock().unwrap_or_else(PoisonError::into_inner);
        trace!(%tag, %pass, "running system");
        match pass {
            Pass::Configure => system.configure(ctx),
            Pass::Update => system.update(ctx),
        }
    }
}
