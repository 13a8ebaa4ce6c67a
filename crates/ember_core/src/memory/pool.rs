//! # Node Pool
//!
//! Free-list arena that recycles node slots, bounding allocation to the
//! high-water mark of concurrently matched entities instead of per-tick churn.

use crate::ecs::{Node, NodeHandle, NodeShape};
use crate::error::{FamilyError, FamilyResult};

/// Source and sink of node slots for one family.
///
/// A handle returned by [`un_pool`](NodePool::un_pool) refers to a slot whose
/// contents are unspecified until [`populate`](NodePool::populate) overwrites
/// it. Released slots keep their memory; nothing is cleared on release.
pub trait NodePool<S: NodeShape> {
    /// Hands out a slot, recycled from the free list when one is available.
    ///
    /// Every handle that is live (handed out and not yet released) must be
    /// distinct from every other live handle. Indices need not be dense.
    ///
    /// # Errors
    ///
    /// [`FamilyError::PoolExhausted`] if no further slot can be addressed.
    fn un_pool(&mut self) -> FamilyResult<NodeHandle>;

    /// Returns a slot to the free list.
    fn pool(&mut self, handle: NodeHandle);

    /// Marks a slot for release at the next [`release_cache`](NodePool::release_cache).
    ///
    /// The node stays readable until then.
    fn cache(&mut self, handle: NodeHandle);

    /// Releases every cached slot, in the order they were cached.
    fn release_cache(&mut self);

    /// Overwrites the whole slot with `node`.
    fn populate(&mut self, handle: NodeHandle, node: Node<S>);

    /// Reads a live or cached node.
    fn get(&self, handle: NodeHandle) -> Option<&Node<S>>;
}

/// Lifecycle state of a pool slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Free,
    Live,
    Cached,
}

/// One arena slot.
struct Slot<S: NodeShape> {
    generation: u32,
    state: SlotState,
    node: Option<Node<S>>,
}

/// The default growable node pool.
///
/// The pool never shrinks: it grows to the historical peak of concurrently
/// live nodes and recycles from there.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by exactly one family.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: DefaultNodePool<(Position,)> = DefaultNodePool::with_capacity(64);
///
/// let handle = pool.un_pool()?;
/// pool.populate(handle, Node::new(entity.id(), (position,)));
///
/// pool.pool(handle);
/// ```
pub struct DefaultNodePool<S: NodeShape> {
    /// The storage array.
    slots: Vec<Slot<S>>,
    /// Free list - indices of available slots.
    free_list: Vec<u32>,
    /// Handles awaiting deferred release.
    cached: Vec<NodeHandle>,
    /// Number of slots handed out and not yet released.
    live_count: usize,
}

impl<S: NodeShape> DefaultNodePool<S> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a pool with room reserved for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::with_capacity(capacity),
            cached: Vec::new(),
            live_count: 0,
        }
    }

    /// Total slots ever created (the high-water mark).
    #[inline]
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots handed out and not yet released (cached included).
    #[inline]
    #[must_use]
    pub const fn live_count(&self) -> usize {
        self.live_count
    }

    /// Number of slots ready for reuse.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Number of slots awaiting deferred release.
    #[inline]
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cached.len()
    }

    fn slot(&self, handle: NodeHandle) -> Option<&Slot<S>> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    fn slot_mut(&mut self, handle: NodeHandle) -> Option<&mut Slot<S>> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }
}

impl<S: NodeShape> Default for DefaultNodePool<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: NodeShape> NodePool<S> for DefaultNodePool<S> {
    fn un_pool(&mut self) -> FamilyResult<NodeHandle> {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.state = SlotState::Live;
            self.live_count += 1;
            return Ok(NodeHandle::new(index, slot.generation));
        }

        let index = u32::try_from(self.slots.len()).map_err(|_| FamilyError::PoolExhausted {
            slots: self.slots.len(),
        })?;
        self.slots.push(Slot {
            generation: 0,
            state: SlotState::Live,
            node: None,
        });
        self.live_count += 1;
        Ok(NodeHandle::new(index, 0))
    }

    fn pool(&mut self, handle: NodeHandle) {
        match self.slot_mut(handle) {
            Some(slot) if slot.state != SlotState::Free => {
                slot.state = SlotState::Free;
            }
            _ => {
                tracing::warn!("Ignoring release of unknown node {}", handle);
                return;
            }
        }
        self.free_list.push(handle.index());
        self.live_count -= 1;
    }

    fn cache(&mut self, handle: NodeHandle) {
        let Some(slot) = self
            .slot_mut(handle)
            .filter(|slot| slot.state == SlotState::Live)
        else {
            tracing::warn!("Ignoring cache of unknown node {}", handle);
            return;
        };
        slot.state = SlotState::Cached;
        self.cached.push(handle);
    }

    fn release_cache(&mut self) {
        let cached = std::mem::take(&mut self.cached);
        for handle in &cached {
            self.pool(*handle);
        }
        // Keep the buffer capacity for the next tick.
        self.cached = cached;
        self.cached.clear();
    }

    fn populate(&mut self, handle: NodeHandle, node: Node<S>) {
        match self.slot_mut(handle) {
            Some(slot) if slot.state == SlotState::Live => slot.node = Some(node),
            _ => tracing::warn!("Ignoring populate of unknown node {}", handle),
        }
    }

    fn get(&self, handle: NodeHandle) -> Option<&Node<S>> {
        self.slot(handle)
            .filter(|slot| slot.state != SlotState::Free)
            .and_then(|slot| slot.node.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EntityId;
    use std::sync::Arc;

    type Shape = (u32,);

    fn node(id: u32, value: u32) -> Node<Shape> {
        Node::new(EntityId::new(id, 0), (Arc::new(value),))
    }

    #[test]
    fn test_pool_un_pool_populate() {
        let mut pool: DefaultNodePool<Shape> = DefaultNodePool::new();

        let h1 = pool.un_pool().unwrap();
        assert!(pool.get(h1).is_none());

        pool.populate(h1, node(1, 42));
        assert_eq!(*pool.get(h1).unwrap().components().0, 42);
        assert_eq!(pool.live_count(), 1);

        pool.pool(h1);
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.free_count(), 1);
        assert!(pool.get(h1).is_none());
    }

    #[test]
    fn test_pool_reuse() {
        let mut pool: DefaultNodePool<Shape> = DefaultNodePool::with_capacity(1);

        let h1 = pool.un_pool().unwrap();
        pool.populate(h1, node(1, 1));
        pool.pool(h1);

        let h2 = pool.un_pool().unwrap();
        assert_eq!(h1.index(), h2.index()); // Same slot reused
        assert_ne!(h1.generation(), h2.generation());
        assert_eq!(pool.slot_count(), 1);

        // Stale handle no longer resolves.
        pool.populate(h2, node(2, 2));
        assert!(pool.get(h1).is_none());
        assert_eq!(pool.get(h2).unwrap().entity(), EntityId::new(2, 0));
    }

    #[test]
    fn test_pool_grows_to_peak() {
        let mut pool: DefaultNodePool<Shape> = DefaultNodePool::new();

        let handles: Vec<_> = (0..4).map(|_| pool.un_pool().unwrap()).collect();
        for h in &handles {
            pool.pool(*h);
        }
        for _ in 0..4 {
            pool.un_pool().unwrap();
        }
        assert_eq!(pool.slot_count(), 4);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_pool_double_release_ignored() {
        let mut pool: DefaultNodePool<Shape> = DefaultNodePool::new();

        let h1 = pool.un_pool().unwrap();
        pool.pool(h1);
        pool.pool(h1);
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_pool_cache_defers_release() {
        let mut pool: DefaultNodePool<Shape> = DefaultNodePool::new();

        let h1 = pool.un_pool().unwrap();
        pool.populate(h1, node(1, 7));
        pool.cache(h1);

        // Still readable and not reusable.
        assert_eq!(*pool.get(h1).unwrap().components().0, 7);
        let h2 = pool.un_pool().unwrap();
        assert_ne!(h1.index(), h2.index());
        assert_eq!(pool.cached_count(), 1);

        pool.release_cache();
        assert_eq!(pool.cached_count(), 0);
        assert!(pool.get(h1).is_none());
        assert_eq!(pool.un_pool().unwrap().index(), h1.index());
    }
}
