// src/registry.rs

//! Identity registry for systems and affinities.
//!
//! Every distinct system type (or caller-chosen system name) and every
//! distinct affinity is assigned a small, stable integer tag the first time
//! it is seen. Tags double as bitset and array indices inside the graph.
//!
//! Allocation is monotonic and never reset. A process-wide instance is
//! available through [`TagRegistry::global`]; tests and embedders that want
//! isolated tag spaces can create their own with [`TagRegistry::new`] and
//! thread it through `Group::with_registry` / `Runtime::with_traverser`.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::trace;

use crate::dag::tag_set::MAX_NODES;
use crate::errors::{violation, GraphError};
use crate::exec::affinity::{Affinity, DefaultAffinity};

/// Stable identifier of a registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(u16);

impl Tag {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index < MAX_NODES);
        Tag(index as u16)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identifier of an affinity (a kind of execution context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AffinityTag(u16);

impl AffinityTag {
    /// The affinity every system runs on unless bound elsewhere.
    pub const DEFAULT: AffinityTag = AffinityTag(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

impl fmt::Display for AffinityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Name under which the default affinity is registered.
pub const DEFAULT_AFFINITY_NAME: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Type(TypeId),
    Name(String),
}

#[derive(Debug)]
struct RegistryInner {
    systems: HashMap<Key, Tag>,
    system_names: Vec<String>,
    affinities: HashMap<Key, AffinityTag>,
    affinity_names: Vec<String>,
}

/// Maps type descriptors and names to tags.
#[derive(Debug)]
pub struct TagRegistry {
    inner: Mutex<RegistryInner>,
}

static GLOBAL: OnceLock<Arc<TagRegistry>> = OnceLock::new();

impl TagRegistry {
    pub fn new() -> Self {
        let mut affinities = HashMap::new();
        affinities.insert(
            Key::Name(DEFAULT_AFFINITY_NAME.to_string()),
            AffinityTag::DEFAULT,
        );
        affinities.insert(
            Key::Type(TypeId::of::<DefaultAffinity>()),
            AffinityTag::DEFAULT,
        );

        Self {
            inner: Mutex::new(RegistryInner {
                systems: HashMap::new(),
                system_names: Vec::new(),
                affinities,
                affinity_names: vec![DEFAULT_AFFINITY_NAME.to_string()],
            }),
        }
    }

    /// The process-wide registry, created on first use and never reset.
    pub fn global() -> Arc<TagRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TagRegistry::new())))
    }

    /// Tag of the system type `T`.
    #[track_caller]
    pub fn system_tag<T: 'static>(&self) -> Tag {
        self.system_for(Key::Type(TypeId::of::<T>()), std::any::type_name::<T>())
    }

    /// Tag of a system identified by a caller-supplied name.
    #[track_caller]
    pub fn system_named(&self, name: &str) -> Tag {
        self.system_for(Key::Name(name.to_string()), name)
    }

    /// Tag of the affinity type `A`.
    pub fn affinity_tag<A: Affinity>(&self) -> AffinityTag {
        self.affinity_for(Key::Type(TypeId::of::<A>()), A::name())
    }

    /// Tag of an affinity identified by a caller-supplied name.
    ///
    /// `"default"` resolves to [`AffinityTag::DEFAULT`].
    pub fn affinity_named(&self, name: &str) -> AffinityTag {
        self.affinity_for(Key::Name(name.to_string()), name)
    }

    /// Display name of a system tag.
    pub fn system_name(&self, tag: Tag) -> String {
        self.lock()
            .system_names
            .get(tag.index())
            .cloned()
            .unwrap_or_else(|| tag.to_string())
    }

    /// Display name of an affinity tag.
    pub fn affinity_name(&self, tag: AffinityTag) -> String {
        self.lock()
            .affinity_names
            .get(tag.index())
            .cloned()
            .unwrap_or_else(|| tag.to_string())
    }

    /// All affinity tags whose display name equals `name`.
    pub fn affinities_named(&self, name: &str) -> Vec<AffinityTag> {
        self.lock()
            .affinity_names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(i, _)| AffinityTag(i as u16))
            .collect()
    }

    /// Number of system tags allocated so far.
    pub fn system_count(&self) -> usize {
        self.lock().system_names.len()
    }

    #[track_caller]
    fn system_for(&self, key: Key, name: &str) -> Tag {
        let mut inner = self.lock();
        if let Some(tag) = inner.systems.get(&key) {
            return *tag;
        }

        let index = inner.system_names.len();
        if index >= MAX_NODES {
            drop(inner);
            violation(GraphError::TooManyNodes { limit: MAX_NODES });
        }

        let tag = Tag::from_index(index);
        inner.systems.insert(key, tag);
        inner.system_names.push(name.to_string());
        trace!(%tag, name, "allocated system tag");
        tag
    }

    fn affinity_for(&self, key: Key, name: &str) -> AffinityTag {
        let mut inner = self.lock();
        if let Some(tag) = inner.affinities.get(&key) {
            return *tag;
        }

        let tag = AffinityTag(inner.affinity_names.len() as u16);
        inner.affinities.insert(key, tag);
        inner.affinity_names.push(name.to_string());
        trace!(%tag, name, "allocated affinity tag");
        tag
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[derive(Default)]
    struct Render;
    impl Affinity for Render {
        fn name() -> &'static str {
            "render"
        }
    }

    #[test]
    fn same_type_yields_same_tag() {
        let reg = TagRegistry::new();
        let a = reg.system_tag::<Alpha>();
        let b = reg.system_tag::<Beta>();
        assert_ne!(a, b);
        assert_eq!(a, reg.system_tag::<Alpha>());
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
    }

    #[test]
    fn names_and_types_share_one_counter() {
        let reg = TagRegistry::new();
        let a = reg.system_tag::<Alpha>();
        let n = reg.system_named("physics");
        assert_eq!(n.index(), a.index() + 1);
        assert_eq!(reg.system_name(n), "physics");
        assert_eq!(reg.system_named("physics"), n);
        assert_eq!(reg.system_count(), 2);
    }

    #[test]
    fn default_affinity_is_reserved() {
        let reg = TagRegistry::new();
        assert_eq!(reg.affinity_named("default"), AffinityTag::DEFAULT);
        assert_eq!(reg.affinity_name(AffinityTag::DEFAULT), "default");

        let render = reg.affinity_tag::<Render>();
        assert_eq!(render.index(), 1);
        assert_eq!(reg.affinities_named("render"), vec![render]);
        assert_eq!(reg.affinity_tag::<Render>(), render);
    }

    #[test]
    fn default_affinity_type_maps_to_reserved_tag() {
        let reg = TagRegistry::new();
        assert_eq!(reg.affinity_tag::<DefaultAffinity>(), AffinityTag::DEFAULT);
        assert_eq!(reg.affinities_named("default"), vec![AffinityTag::DEFAULT]);
    }

    #[test]
    #[should_panic(expected = "too many systems")]
    fn allocating_past_the_limit_aborts() {
        let reg = TagRegistry::new();
        for i in 0..=MAX_NODES {
            reg.system_named(&format!("node_{i}"));
        }
    }
}
