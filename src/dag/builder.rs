// src/dag/builder.rs

//! Fluent declaration of edges and affinities.
//!
//! `Group::add_system` / `add_node` / `add_group` return an [`EdgeBuilder`]
//! that remembers the tags just added. Dependencies declared through it
//! apply to all of those tags at once:
//!
//! ```ignore
//! group.add_system::<Render>()
//!     .with_affinity::<GlThread>()
//!     .depends_on::<Physics>()
//!     .and::<Animation>();
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::dag::graph::Group;
use crate::exec::affinity::{factory_of, Affinity, AffinityFactory};
use crate::registry::{AffinityTag, Tag};

/// Handle over the tags that were just added to a group.
pub struct EdgeBuilder<'g, C: 'static> {
    group: &'g mut Group<C>,
    current: BTreeSet<Tag>,
}

impl<'g, C: 'static> EdgeBuilder<'g, C> {
    pub(crate) fn new(group: &'g mut Group<C>, current: BTreeSet<Tag>) -> Self {
        Self { group, current }
    }

    /// Tags this builder applies to.
    pub fn tags(&self) -> &BTreeSet<Tag> {
        &self.current
    }

    /// Wait for the system type `U`.
    #[track_caller]
    pub fn depends_on<U: 'static>(self) -> ChainBuilder<'g, C> {
        let on = self.group.registry().system_tag::<U>();
        self.depends_on_tag(on)
    }

    /// Wait for the system registered under `on`.
    #[track_caller]
    pub fn depends_on_tag(self, on: Tag) -> ChainBuilder<'g, C> {
        self.group.depend(&self.current, on);
        ChainBuilder { inner: self }
    }

    /// Wait for every system of an already merged group.
    #[track_caller]
    pub fn depends_on_group(self, group: &Group<C>) -> ChainBuilder<'g, C> {
        self.group.depend_on_group(&self.current, group);
        ChainBuilder { inner: self }
    }

    /// Run on affinity `A`.
    #[track_caller]
    pub fn with_affinity<A: Affinity + Default>(self) -> Self {
        let tag = self.group.registry().affinity_tag::<A>();
        self.with_affinity_tag(tag, factory_of::<A>())
    }

    /// Run on the affinity registered under `affinity`, built by `factory`.
    ///
    /// The factory is only recorded the first time an affinity is bound in
    /// a group; later bindings reuse it.
    #[track_caller]
    pub fn with_affinity_tag(self, affinity: AffinityTag, factory: AffinityFactory) -> Self {
        self.group.bind_affinity(&self.current, affinity, factory);
        self
    }

    /// Run on an affinity whose contexts are built by a closure.
    #[track_caller]
    pub fn with_affinity_fn<F, A>(self, affinity: AffinityTag, make: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
        A: Affinity,
    {
        let factory: AffinityFactory = Arc::new(move || Box::new(make()) as Box<dyn Affinity>);
        self.with_affinity_tag(affinity, factory)
    }
}

/// Returned after the first dependency; adds more of them.
pub struct ChainBuilder<'g, C: 'static> {
    inner: EdgeBuilder<'g, C>,
}

impl<'g, C: 'static> ChainBuilder<'g, C> {
    #[track_caller]
    pub fn and<V: 'static>(self) -> Self {
        self.inner.depends_on::<V>()
    }

    #[track_caller]
    pub fn and_tag(self, on: Tag) -> Self {
        self.inner.depends_on_tag(on)
    }

    #[track_caller]
    pub fn and_group(self, group: &Group<C>) -> Self {
        self.inner.depends_on_group(group)
    }

    pub fn tags(&self) -> &BTreeSet<Tag> {
        self.inner.tags()
    }
}
