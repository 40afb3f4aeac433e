// src/dag/graph.rs

//! Groups of systems and the frozen topology they compile into.
//!
//! A [`Group`] is mutable until it is either merged into another group or
//! handed to a runtime; after that it is permanently read-only. The static
//! part of a group (nodes, edges, affinity factories) is kept in a
//! [`Topology`], which is what the scheduler and traversers share across
//! threads once a runtime starts executing passes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::debug;

use crate::dag::builder::EdgeBuilder;
use crate::dag::node::{NodeInfo, System};
use crate::dag::tag_set::TagSet;
use crate::errors::{violation, GraphError};
use crate::exec::affinity::{Affinity, AffinityFactory};
use crate::registry::{AffinityTag, Tag, TagRegistry};

/// A registered affinity: display name plus the factory for its contexts.
#[derive(Clone)]
pub struct AffinityEntry {
    pub name: String,
    pub factory: AffinityFactory,
}

/// Nodes, edges and affinity factories keyed by tag.
#[derive(Clone, Default)]
pub struct Topology {
    /// Dense table indexed by `Tag::index()`; sized to the highest tag + 1.
    nodes: Vec<Option<NodeInfo>>,
    membership: TagSet,
    roots: BTreeSet<Tag>,
    affinities: BTreeMap<AffinityTag, AffinityEntry>,
}

impl Topology {
    pub fn node(&self, tag: Tag) -> Option<&NodeInfo> {
        self.nodes.get(tag.index()).and_then(Option::as_ref)
    }

    /// Nodes in ascending tag order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.iter().flatten()
    }

    pub fn membership(&self) -> &TagSet {
        &self.membership
    }

    /// Systems with no dependencies; the initial ready set of every pass.
    pub fn roots(&self) -> &BTreeSet<Tag> {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.membership.len()
    }

    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    /// Affinity the given system is bound to (default if unknown).
    pub fn affinity_of(&self, tag: Tag) -> AffinityTag {
        self.node(tag)
            .map(|n| n.affinity)
            .unwrap_or(AffinityTag::DEFAULT)
    }

    pub fn affinity(&self, tag: AffinityTag) -> Option<&AffinityEntry> {
        self.affinities.get(&tag)
    }

    pub fn affinities(&self) -> impl Iterator<Item = (AffinityTag, &AffinityEntry)> {
        self.affinities.iter().map(|(t, e)| (*t, e))
    }

    pub fn affinity_name(&self, tag: AffinityTag) -> String {
        self.affinities
            .get(&tag)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| tag.to_string())
    }

    /// Human-readable listing of systems, dependencies and affinities.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "systems ({}):", self.len());
        for node in self.nodes() {
            let _ = writeln!(out, "  - {}", node.name);
            if !node.dependencies.is_empty() {
                let deps: Vec<&str> = node
                    .dependencies
                    .iter()
                    .filter_map(|t| self.node(t).map(|n| n.name.as_str()))
                    .collect();
                let _ = writeln!(out, "      after: {:?}", deps);
            }
            if !node.affinity.is_default() {
                let _ = writeln!(out, "      affinity: {}", self.affinity_name(node.affinity));
            }
        }
        let roots: Vec<&str> = self
            .roots
            .iter()
            .filter_map(|t| self.node(*t).map(|n| n.name.as_str()))
            .collect();
        let _ = writeln!(out, "roots: {:?}", roots);
        out
    }

    fn node_mut(&mut self, tag: Tag) -> Option<&mut NodeInfo> {
        self.nodes.get_mut(tag.index()).and_then(Option::as_mut)
    }

    fn name_of(&self, tag: Tag) -> String {
        self.node(tag)
            .map(|n| n.name.clone())
            .unwrap_or_else(|| tag.to_string())
    }

    fn grow_to(&mut self, tag: Tag) {
        if self.nodes.len() <= tag.index() {
            self.nodes.resize(tag.index() + 1, None);
        }
    }
}

impl fmt::Debug for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("nodes", &self.nodes().collect::<Vec<_>>())
            .field("roots", &self.roots)
            .field(
                "affinities",
                &self
                    .affinities
                    .iter()
                    .map(|(t, e)| (t.index(), e.name.as_str()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A composable set of systems and their ordering constraints.
///
/// ```ignore
/// let mut group = Group::<World>::new();
/// group.add_system::<Input>();
/// group.add_system::<Physics>().depends_on::<Input>();
///
/// let mut runtime = Runtime::<World>::sequential();
/// runtime.add_group(&mut group).with_affinity::<RenderThread>();
/// ```
pub struct Group<C> {
    registry: Arc<TagRegistry>,
    topology: Topology,
    /// Behaviors indexed like `topology.nodes`; moved out on merge/freeze.
    systems: Vec<Option<Box<dyn System<C>>>>,
    frozen: bool,
}

impl<C: 'static> Group<C> {
    /// Empty group using the process-wide registry.
    pub fn new() -> Self {
        Self::with_registry(TagRegistry::global())
    }

    pub fn with_registry(registry: Arc<TagRegistry>) -> Self {
        Self {
            registry,
            topology: Topology::default(),
            systems: Vec::new(),
            frozen: false,
        }
    }

    pub fn registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn membership(&self) -> &TagSet {
        &self.topology.membership
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.topology.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topology.is_empty()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.contains_tag(self.registry.system_tag::<T>())
    }

    pub fn contains_tag(&self, tag: Tag) -> bool {
        self.topology.membership.contains(tag)
    }

    /// Register the system type `T` as a new root.
    #[track_caller]
    pub fn add_system<T>(&mut self) -> EdgeBuilder<'_, C>
    where
        T: System<C> + Default,
    {
        let tag = self.registry.system_tag::<T>();
        self.add_node(tag, T::default())
    }

    /// Register a system instance under an explicit tag.
    #[track_caller]
    pub fn add_node(&mut self, tag: Tag, system: impl System<C>) -> EdgeBuilder<'_, C> {
        self.insert_node(tag, Box::new(system));
        EdgeBuilder::new(self, BTreeSet::from([tag]))
    }

    /// Merge `child` into this group as one unit.
    ///
    /// `child` is frozen afterwards. The returned builder covers every system
    /// that came from `child`, so the whole group can be bound to an affinity
    /// or made to depend on something in one chain.
    #[track_caller]
    pub fn add_group(&mut self, child: &mut Group<C>) -> EdgeBuilder<'_, C> {
        let merged = self.merge(child);
        EdgeBuilder::new(self, merged)
    }

    #[track_caller]
    fn insert_node(&mut self, tag: Tag, system: Box<dyn System<C>>) {
        self.ensure_editable("add a system");
        if self.topology.membership.contains(tag) {
            violation(GraphError::DuplicateNode {
                name: self.topology.name_of(tag),
            });
        }

        let name = self.registry.system_name(tag);
        debug!(%tag, name = %name, "adding system to group");

        self.topology.grow_to(tag);
        if self.systems.len() <= tag.index() {
            self.systems.resize_with(tag.index() + 1, || None);
        }
        self.topology.nodes[tag.index()] = Some(NodeInfo::new(tag, name));
        self.systems[tag.index()] = Some(system);
        self.topology.membership.insert(tag);
        self.topology.roots.insert(tag);
    }

    #[track_caller]
    pub(crate) fn merge(&mut self, child: &mut Group<C>) -> BTreeSet<Tag> {
        self.ensure_editable("merge a group");
        if child.frozen {
            violation(GraphError::MergeFrozen);
        }
        if child.is_empty() {
            violation(GraphError::MergeEmpty);
        }
        self.ensure_same_registry(child);

        let overlap = self.topology.membership.intersection(&child.topology.membership);
        if !overlap.is_empty() {
            violation(GraphError::MergeOverlap {
                names: overlap.iter().map(|t| self.topology.name_of(t)).collect(),
            });
        }

        let mut merged = BTreeSet::new();
        for tag in child.topology.membership.iter() {
            let Some(info) = child.topology.node(tag).cloned() else {
                continue;
            };
            let system = child.systems.get_mut(tag.index()).and_then(Option::take);

            self.topology.grow_to(tag);
            if self.systems.len() <= tag.index() {
                self.systems.resize_with(tag.index() + 1, || None);
            }
            self.topology.nodes[tag.index()] = Some(info);
            self.systems[tag.index()] = system;
            merged.insert(tag);
        }

        self.topology.membership.union_with(&child.topology.membership);
        self.topology.roots.extend(child.topology.roots.iter().copied());
        for (aff, entry) in child.topology.affinities.iter() {
            self.topology
                .affinities
                .entry(*aff)
                .or_insert_with(|| entry.clone());
        }

        child.frozen = true;
        child.systems.clear();

        debug!(systems = merged.len(), "merged group");
        merged
    }

    /// Make every tag in `dependents` wait for `on`.
    #[track_caller]
    pub(crate) fn depend(&mut self, dependents: &BTreeSet<Tag>, on: Tag) {
        self.ensure_editable("declare a dependency");
        if !self.topology.membership.contains(on) {
            violation(GraphError::MissingDependency {
                dependent: self.first_name(dependents),
                dependency: self.registry.system_name(on),
            });
        }
        if dependents.contains(&on) {
            violation(GraphError::SelfDependency {
                name: self.topology.name_of(on),
            });
        }
        for tag in dependents {
            if let Some(node) = self.topology.node(*tag) {
                if node.dependencies.contains(on) {
                    violation(GraphError::DuplicateDependency {
                        dependent: node.name.clone(),
                        dependency: self.topology.name_of(on),
                    });
                }
            }
        }

        for tag in dependents {
            if let Some(node) = self.topology.node_mut(*tag) {
                node.dependencies.insert(on);
            }
            self.topology.roots.remove(tag);
        }
        if let Some(node) = self.topology.node_mut(on) {
            node.successors.extend(dependents.iter().copied());
        }
    }

    /// Make every tag in `dependents` wait for every system of `group`.
    ///
    /// `group` must already have been merged into this group.
    #[track_caller]
    pub(crate) fn depend_on_group(&mut self, dependents: &BTreeSet<Tag>, group: &Group<C>) {
        self.ensure_editable("declare a dependency");
        self.ensure_same_registry(group);

        let members = group.topology.membership;
        if !group.frozen || !self.topology.membership.is_superset(&members) {
            violation(GraphError::GroupNotMerged);
        }
        for tag in dependents {
            if members.contains(*tag) {
                violation(GraphError::DependentInGroup {
                    name: self.topology.name_of(*tag),
                });
            }
        }
        for tag in dependents {
            if let Some(node) = self.topology.node(*tag) {
                if let Some(dup) = node.dependencies.intersection(&members).iter().next() {
                    violation(GraphError::DuplicateDependency {
                        dependent: node.name.clone(),
                        dependency: self.topology.name_of(dup),
                    });
                }
            }
        }

        for tag in dependents {
            if let Some(node) = self.topology.node_mut(*tag) {
                node.dependencies.union_with(&members);
            }
            self.topology.roots.remove(tag);
        }
        for member in members.iter() {
            if let Some(node) = self.topology.node_mut(member) {
                node.successors.extend(dependents.iter().copied());
            }
        }
    }

    /// Pin every tag in `targets` to `affinity`, registering its factory on
    /// first use.
    #[track_caller]
    pub(crate) fn bind_affinity(
        &mut self,
        targets: &BTreeSet<Tag>,
        affinity: AffinityTag,
        factory: AffinityFactory,
    ) {
        self.ensure_editable("bind an affinity");
        for tag in targets {
            if let Some(node) = self.topology.node(*tag) {
                if !node.affinity.is_default() {
                    violation(GraphError::AffinityAlreadyBound {
                        name: node.name.clone(),
                        affinity: self.topology.affinity_name(node.affinity),
                    });
                }
            }
        }

        let name = self.registry.affinity_name(affinity);
        self.topology
            .affinities
            .entry(affinity)
            .or_insert_with(|| AffinityEntry { name, factory });

        for tag in targets {
            if let Some(node) = self.topology.node_mut(*tag) {
                node.affinity = affinity;
            }
        }
    }

    pub(crate) fn register_affinity<A: Affinity + Default>(&mut self) -> AffinityTag {
        let tag = self.registry.affinity_tag::<A>();
        let name = self.registry.affinity_name(tag);
        self.topology
            .affinities
            .entry(tag)
            .or_insert_with(|| AffinityEntry {
                name,
                factory: crate::exec::affinity::factory_of::<A>(),
            });
        tag
    }

    /// Freeze the group and hand out its topology and behaviors.
    pub(crate) fn freeze(&mut self) -> (Topology, Vec<Option<Box<dyn System<C>>>>) {
        self.frozen = true;
        (self.topology.clone(), std::mem::take(&mut self.systems))
    }

    #[track_caller]
    fn ensure_editable(&self, action: &'static str) {
        if self.frozen {
            violation(GraphError::Frozen { action });
        }
    }

    #[track_caller]
    fn ensure_same_registry(&self, other: &Group<C>) {
        if !Arc::ptr_eq(&self.registry, &other.registry) {
            violation(GraphError::RegistryMismatch);
        }
    }

    fn first_name(&self, tags: &BTreeSet<Tag>) -> String {
        tags.iter()
            .next()
            .map(|t| self.topology.name_of(*t))
            .unwrap_or_default()
    }
}

impl<C: 'static> Default for Group<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Group<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("topology", &self.topology)
            .field("frozen", &self.frozen)
            .finish_non_exhaustive()
    }
}
