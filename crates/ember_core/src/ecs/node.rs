//! # Nodes
//!
//! A node binds one matching entity's required components for fast
//! consumption by systems. Nodes live in a [`NodePool`](crate::memory::NodePool)
//! arena and are addressed by [`NodeHandle`]; the list links live in the
//! [`NodeList`](super::node_list::NodeList).

use std::fmt;

use super::entity::EntityId;
use super::shape::NodeShape;

/// Handle to a node slot in a pool.
///
/// The generation increments every time a recycled slot is handed out, so a
/// stale handle never resolves to a newer node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    /// Creates a handle from slot index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the pool.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}v{}", self.index, self.generation)
    }
}

/// A node: the entity back-reference plus one component reference per
/// shape slot.
///
/// The references are snapshots taken when the entity matched. They are not
/// refreshed if the entity later swaps a component instance.
pub struct Node<S: NodeShape> {
    entity: EntityId,
    components: S::Components,
}

impl<S: NodeShape> Node<S> {
    /// Creates a fully populated node.
    #[inline]
    #[must_use]
    pub fn new(entity: EntityId, components: S::Components) -> Self {
        Self { entity, components }
    }

    /// The entity this node was matched from.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// The bound components, in shape order.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> &S::Components {
        &self.components
    }
}

impl<S: NodeShape> Clone for Node<S> {
    fn clone(&self) -> Self {
        Self {
            entity: self.entity,
            components: self.components.clone(),
        }
    }
}

impl<S: NodeShape> fmt::Debug for Node<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("shape", &S::name())
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}
