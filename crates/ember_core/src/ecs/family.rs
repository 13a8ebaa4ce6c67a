//! # Component Matching Family
//!
//! The single source of truth for "which entities currently satisfy this
//! shape", kept correct under incremental entity and component events.
//!
//! ## Event Flow
//!
//! ```text
//! entity_added / component_added     ──► match? ──► un_pool ─► populate ─► list.add
//! entity_removed / component_removed ──► member? ─► list.remove ─► pool (or cache)
//! before_update ──► list.lock
//! after_update  ──► list.unlock (replay) ──► pool.release_cache
//! ```
//!
//! `entity_added` on an entity that is already a member is the only hard
//! error. Every other call on an absent or irrelevant entity is a no-op, so
//! game code may report component changes speculatively.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;

use super::component::ComponentType;
use super::entity::{ComponentLookup, EntityId, EntityObserver};
use super::node::{Node, NodeHandle};
use super::node_list::{self, NodeChange, NodeList};
use super::shape::NodeShape;
use crate::config::FamilyConfig;
use crate::error::{FamilyError, FamilyResult};
use crate::memory::{DefaultNodePool, NodePool};

/// Object-safe view of a family, used by [`FamilySet`](super::registry::FamilySet)
/// to drive families of different shapes together.
pub trait Family: EntityObserver + Any {
    /// Label used in logs and errors.
    fn name(&self) -> &str;

    /// The required component types, in slot order.
    fn shape(&self) -> &[ComponentType];

    /// See [`ComponentMatchingFamily::entity_added`].
    ///
    /// # Errors
    ///
    /// [`FamilyError::DuplicateMembership`] if the entity is already a member.
    fn entity_added(&mut self, entity: &dyn ComponentLookup) -> FamilyResult<()>;

    /// See [`ComponentMatchingFamily::entity_removed`].
    fn entity_removed(&mut self, entity: &dyn ComponentLookup);

    /// Locks the node list.
    fn before_update(&mut self);

    /// Unlocks the node list and flushes deferred mutations.
    fn after_update(&mut self);

    /// Releases every node and forgets every member.
    fn clean_up(&mut self);

    /// Number of nodes in the visible sequence.
    fn len(&self) -> usize;

    /// Whether the visible sequence is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Incrementally maintains the nodes of every entity matching shape `S`.
///
/// # Type Parameters
///
/// * `S` - The shape: a tuple of required component types
/// * `P` - The node pool; [`DefaultNodePool`] unless one is injected
///
/// # Example
///
/// ```rust,ignore
/// let mut family = ComponentMatchingFamily::<(Position, Velocity)>::new();
/// family.entity_added(&entity)?;
///
/// family.before_update();
/// for node in family.nodes() {
///     let (position, velocity) = node.components();
///     // ...
/// }
/// family.after_update();
/// ```
pub struct ComponentMatchingFamily<S: NodeShape, P: NodePool<S> = DefaultNodePool<S>> {
    name: String,
    /// Required component types in slot order.
    shape: Vec<ComponentType>,
    nodes: NodeList,
    /// Entity -> node index. An entity is here iff it has a live node.
    entities: HashMap<EntityId, NodeHandle>,
    pool: P,
    _shape: PhantomData<fn() -> S>,
}

impl<S: NodeShape> ComponentMatchingFamily<S> {
    /// Creates a family with a default pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pool(DefaultNodePool::new())
    }

    /// Creates a family from configuration.
    #[must_use]
    pub fn from_config(config: &FamilyConfig) -> Self {
        let mut family = Self::with_pool(DefaultNodePool::with_capacity(config.pool_capacity));
        family.nodes = NodeList::with_capacity(config.pool_capacity);
        family.nodes.track_changes(config.track_changes);
        if let Some(name) = &config.name {
            family.name.clone_from(name);
        }
        tracing::debug!(
            "Configured family {} (pool_capacity={}, track_changes={})",
            family.name,
            config.pool_capacity,
            config.track_changes
        );
        family
    }
}

impl<S: NodeShape> Default for ComponentMatchingFamily<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: NodeShape, P: NodePool<S>> ComponentMatchingFamily<S, P> {
    /// Creates a family that draws its nodes from `pool`.
    #[must_use]
    pub fn with_pool(pool: P) -> Self {
        Self {
            name: S::name(),
            shape: S::component_types(),
            nodes: NodeList::new(),
            entities: HashMap::new(),
            pool,
            _shape: PhantomData,
        }
    }

    /// Renames the family.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Label used in logs and errors.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The required component types, in slot order.
    #[inline]
    #[must_use]
    pub fn shape(&self) -> &[ComponentType] {
        &self.shape
    }

    /// Whether `entity` currently has every required component.
    #[must_use]
    pub fn matches(&self, entity: &dyn ComponentLookup) -> bool {
        self.shape.iter().all(|ty| entity.has_component(*ty))
    }

    /// An entity became known to the engine.
    ///
    /// Adds a node if the entity matches the shape; otherwise does nothing.
    ///
    /// # Errors
    ///
    /// - [`FamilyError::DuplicateMembership`] if the entity matches and is
    ///   already a member. The existing node is left untouched.
    /// - [`FamilyError::ComponentUnavailable`] if the entity reports a
    ///   required component that its lookup cannot produce.
    /// - [`FamilyError::PoolExhausted`] if the pool cannot hand out a node.
    ///
    /// On error the family is unchanged.
    pub fn entity_added(&mut self, entity: &dyn ComponentLookup) -> FamilyResult<()> {
        if !self.matches(entity) {
            return Ok(());
        }

        let id = entity.entity_id();
        if self.entities.contains_key(&id) {
            tracing::warn!("Entity {} added twice to family {}", id, self.name);
            return Err(FamilyError::DuplicateMembership {
                entity: id,
                family: self.name.clone(),
            });
        }

        self.bind(entity)
    }

    /// An entity left the engine. Does nothing if it has no node here.
    pub fn entity_removed(&mut self, entity: &dyn ComponentLookup) {
        self.remove_entity_id(entity.entity_id());
    }

    /// Removes the node of the entity with `id`, if any.
    ///
    /// For stores that have already dropped the entity record. Returns
    /// whether a node was removed.
    pub fn remove_entity_id(&mut self, id: EntityId) -> bool {
        let Some(handle) = self.entities.remove(&id) else {
            return false;
        };

        self.nodes.remove(handle);
        if self.nodes.is_locked() {
            // The frozen sequence may still be read until after_update.
            self.pool.cache(handle);
        } else {
            self.pool.pool(handle);
        }

        tracing::trace!("Family {}: removed {} for entity {}", self.name, handle, id);
        true
    }

    /// A component of type `ty` was attached to `entity`.
    ///
    /// Adds a node if `ty` is required and the entity now matches. Irrelevant
    /// types and existing members are no-ops.
    ///
    /// # Errors
    ///
    /// [`FamilyError::ComponentUnavailable`] if the entity's lookup is
    /// inconsistent with its existence check, or
    /// [`FamilyError::PoolExhausted`] if the pool cannot hand out a node.
    pub fn component_added(
        &mut self,
        entity: &dyn ComponentLookup,
        ty: ComponentType,
    ) -> FamilyResult<()> {
        if !self.shape.contains(&ty) || self.entities.contains_key(&entity.entity_id()) {
            return Ok(());
        }
        if !self.matches(entity) {
            return Ok(());
        }
        self.bind(entity)
    }

    /// A component of type `ty` was detached from `entity`.
    ///
    /// Losing any required component evicts the entity's node. Irrelevant
    /// types and non-members are no-ops.
    pub fn component_removed(&mut self, entity: &dyn ComponentLookup, ty: ComponentType) {
        if self.shape.contains(&ty) {
            self.remove_entity_id(entity.entity_id());
        }
    }

    /// Locks the node list for the duration of an update.
    pub fn before_update(&mut self) {
        self.nodes.lock();
    }

    /// Unlocks the node list, replaying deferred mutations in request order,
    /// then releases nodes removed during the update back to the pool.
    pub fn after_update(&mut self) {
        self.nodes.unlock();
        self.pool.release_cache();
    }

    /// Releases every node back to the pool and forgets every member.
    pub fn clean_up(&mut self) {
        let released = self.nodes.clear();
        for handle in &released {
            self.pool.pool(*handle);
        }
        self.pool.release_cache();
        self.entities.clear();
        tracing::debug!("Family {}: cleaned up {} nodes", self.name, released.len());
    }

    /// Iterates the nodes of the visible sequence.
    #[must_use]
    pub fn nodes(&self) -> Nodes<'_, S, P> {
        Nodes {
            handles: self.nodes.iter(),
            pool: &self.pool,
            _shape: PhantomData,
        }
    }

    /// The underlying node list, for handle-based cursors.
    #[inline]
    #[must_use]
    pub const fn node_list(&self) -> &NodeList {
        &self.nodes
    }

    /// Takes the node-list change log.
    ///
    /// Empty unless the family was configured with change tracking.
    pub fn drain_changes(&mut self) -> Vec<NodeChange> {
        self.nodes.drain_changes()
    }

    /// Resolves a node handle.
    ///
    /// Nodes removed during the current update stay readable until
    /// [`after_update`](Self::after_update).
    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> Option<&Node<S>> {
        self.pool.get(handle)
    }

    /// The node of the entity with `id`, if it is a member.
    #[must_use]
    pub fn node_of(&self, id: EntityId) -> Option<&Node<S>> {
        self.entities.get(&id).and_then(|h| self.pool.get(*h))
    }

    /// Whether the entity with `id` is a member.
    ///
    /// Reflects membership immediately, even while the list is locked.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of members, including those whose node is still queued.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of nodes in the visible sequence.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the visible sequence is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether an update is in progress.
    #[inline]
    #[must_use]
    pub const fn is_updating(&self) -> bool {
        self.nodes.is_locked()
    }

    /// The node pool.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> &P {
        &self.pool
    }

    /// Binds a matching entity into a fresh node and appends it.
    fn bind(&mut self, entity: &dyn ComponentLookup) -> FamilyResult<()> {
        let id = entity.entity_id();
        let Some(components) = S::fetch(entity) else {
            let component = self
                .shape
                .iter()
                .find(|ty| entity.component_erased(**ty).is_none())
                .or_else(|| self.shape.first())
                .map_or("", |ty| ty.name());
            return Err(FamilyError::ComponentUnavailable { entity: id, component });
        };

        // Every slot is overwritten; recycled nodes never leak old references.
        let handle = self.pool.un_pool()?;
        self.pool.populate(handle, Node::new(id, components));
        self.entities.insert(id, handle);
        self.nodes.add(handle);

        tracing::trace!("Family {}: added {} for entity {}", self.name, handle, id);
        Ok(())
    }
}

impl<S: NodeShape, P: NodePool<S>> EntityObserver for ComponentMatchingFamily<S, P> {
    fn component_added(
        &mut self,
        entity: &dyn ComponentLookup,
        ty: ComponentType,
    ) -> FamilyResult<()> {
        Self::component_added(self, entity, ty)
    }

    fn component_removed(&mut self, entity: &dyn ComponentLookup, ty: ComponentType) {
        Self::component_removed(self, entity, ty);
    }
}

impl<S: NodeShape, P: NodePool<S> + 'static> Family for ComponentMatchingFamily<S, P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> &[ComponentType] {
        &self.shape
    }

    fn entity_added(&mut self, entity: &dyn ComponentLookup) -> FamilyResult<()> {
        Self::entity_added(self, entity)
    }

    fn entity_removed(&mut self, entity: &dyn ComponentLookup) {
        Self::entity_removed(self, entity);
    }

    fn before_update(&mut self) {
        Self::before_update(self);
    }

    fn after_update(&mut self) {
        Self::after_update(self);
    }

    fn clean_up(&mut self) {
        Self::clean_up(self);
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Iterator over the nodes of a family's visible sequence.
pub struct Nodes<'a, S: NodeShape, P> {
    handles: node_list::Iter<'a>,
    pool: &'a P,
    _shape: PhantomData<fn() -> S>,
}

impl<'a, S: NodeShape, P: NodePool<S>> Iterator for Nodes<'a, S, P> {
    type Item = &'a Node<S>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let handle = self.handles.next()?;
            if let Some(node) = self.pool.get(handle) {
                return Some(node);
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.handles.size_hint().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::entity::Entity;
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Position(u32);

    #[derive(Debug, PartialEq)]
    struct Velocity(u32);

    fn mover(index: u32) -> Entity {
        Entity::new(EntityId::new(index, 0))
            .with(Position(index))
            .with(Velocity(1))
    }

    #[test]
    fn test_family_name_defaults_to_shape() {
        let family = ComponentMatchingFamily::<(Position, Velocity)>::new();
        assert_eq!(family.name(), "(Position, Velocity)");
        assert_eq!(family.shape().len(), 2);
        assert_eq!(family.named("movement").name(), "movement");
    }

    #[test]
    fn test_locked_removal_keeps_node_readable() {
        let mut family = ComponentMatchingFamily::<(Position,)>::new();
        let a = mover(0);
        let b = mover(1);
        family.entity_added(&a).unwrap();
        family.entity_added(&b).unwrap();

        family.before_update();
        let handle = family.node_list().head().unwrap();
        family.entity_removed(&a);

        assert!(!family.contains(a.id()));
        assert_eq!(family.len(), 2);
        assert_eq!(family.node(handle).unwrap().entity(), a.id());

        // Re-adding during the update must not recycle the cached slot.
        family.entity_added(&a).unwrap();
        assert!(family.node_of(a.id()).is_some());
        assert_eq!(family.pool().cached_count(), 1);
        assert_eq!(family.pool().slot_count(), 3);

        family.after_update();
        let order: Vec<_> = family.nodes().map(Node::entity).collect();
        assert_eq!(order, vec![b.id(), a.id()]);
        assert!(family.node(handle).is_none());
        assert_eq!(family.pool().cached_count(), 0);
    }

    #[test]
    fn test_recycled_node_rebinds_components() {
        let mut family = ComponentMatchingFamily::<(Position, Velocity)>::new();
        let a = mover(0);
        family.entity_added(&a).unwrap();
        family.entity_removed(&a);

        let b = mover(7);
        family.entity_added(&b).unwrap();
        assert_eq!(family.pool().slot_count(), 1);

        let node = family.nodes().next().unwrap();
        assert_eq!(node.entity(), b.id());
        assert!(Arc::ptr_eq(&node.components().0, &b.get::<Position>().unwrap()));
        assert!(Arc::ptr_eq(&node.components().1, &b.get::<Velocity>().unwrap()));
    }

    #[test]
    fn test_from_config() {
        let config = FamilyConfig::default()
            .with_name("movers")
            .with_pool_capacity(16)
            .with_change_tracking(true);
        let mut family = ComponentMatchingFamily::<(Position,)>::from_config(&config);
        assert_eq!(family.name(), "movers");

        let a = mover(0);
        family.entity_added(&a).unwrap();
        family.entity_removed(&a);

        let changes = family.drain_changes();
        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], NodeChange::Added(_)));
        assert!(matches!(changes[1], NodeChange::Removed(_)));
    }

    #[test]
    fn test_clean_up_releases_everything() {
        let mut family = ComponentMatchingFamily::<(Position,)>::new();
        let entities: Vec<_> = (0..3).map(mover).collect();
        for e in &entities {
            family.entity_added(e).unwrap();
        }

        family.before_update();
        family.entity_removed(&entities[0]);
        family.entity_added(&mover(9)).unwrap();
        family.clean_up();
        family.after_update();

        assert!(family.is_empty());
        assert_eq!(family.member_count(), 0);
        assert_eq!(family.pool().live_count(), 0);
        assert_eq!(family.pool().free_count(), family.pool().slot_count());
    }

    #[test]
    fn test_inconsistent_lookup_reports_unavailable() {
        struct Liar(Entity);

        impl ComponentLookup for Liar {
            fn entity_id(&self) -> EntityId {
                self.0.id()
            }
            fn has_component(&self, _ty: ComponentType) -> bool {
                true
            }
            fn component_erased(
                &self,
                ty: ComponentType,
            ) -> Option<crate::ecs::ErasedComponent> {
                self.0.component_erased(ty)
            }
        }

        let mut family = ComponentMatchingFamily::<(Position, Velocity)>::new();
        let liar = Liar(Entity::new(EntityId::new(3, 0)).with(Position(0)));

        let err = family.entity_added(&liar).unwrap_err();
        assert!(matches!(
            err,
            FamilyError::ComponentUnavailable { component, .. } if component.ends_with("Velocity")
        ));
        assert!(family.is_empty());
        assert!(!family.contains(liar.entity_id()));
        assert_eq!(family.pool().slot_count(), 0);
    }
}
