// src/dag/node.rs

//! Units of work and their static graph metadata.

use std::collections::BTreeSet;

use crate::dag::tag_set::TagSet;
use crate::registry::{AffinityTag, Tag};

/// A unit of work executed once per pass.
///
/// `C` is the caller's context object. The scheduler only decides *which*
/// systems may touch it concurrently; coordinating access to its contents
/// is up to the caller (interior mutability, locks, ...).
///
/// ```ignore
/// #[derive(Default)]
/// struct Physics;
///
/// impl System<World> for Physics {
///     fn update(&mut self, world: &World) {
///         world.step();
///     }
/// }
/// ```
pub trait System<C>: Send + 'static {
    fn configure(&mut self, _ctx: &C) {}

    fn update(&mut self, _ctx: &C) {}
}

/// Static information about one registered system.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub tag: Tag,
    /// Registry display name (type name or caller-supplied name).
    pub name: String,
    /// Systems that must finish before this one may start.
    pub dependencies: TagSet,
    /// Systems that list this one as a dependency.
    pub successors: BTreeSet<Tag>,
    pub affinity: AffinityTag,
}

impl NodeInfo {
    pub fn new(tag: Tag, name: String) -> Self {
        Self {
            tag,
            name,
            dependencies: TagSet::new(),
            successors: BTreeSet::new(),
            affinity: AffinityTag::DEFAULT,
        }
    }

    pub fn is_root(&self) -> bool {
        self.dependencies.is_empty()
    }
}
