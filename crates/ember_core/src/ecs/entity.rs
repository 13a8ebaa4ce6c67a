//! # Entities
//!
//! Entities are identities carrying an open-ended set of typed components.
//!
//! The matching core only needs two capabilities from an entity, captured by
//! [`ComponentLookup`]: an existence check per component type and a typed
//! fetch. [`Entity`] is the in-crate implementation; external entity stores
//! can implement the trait for their own records.

use std::collections::HashMap;
use std::sync::Arc;

use super::component::{Component, ComponentType, ErasedComponent};
use crate::error::FamilyResult;

/// Unique identifier for an entity.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index assigned by the entity store
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Read access to an entity's components.
///
/// This is the only capability the matching core requires from the entity
/// store. The trait is object safe; typed access goes through
/// [`fetch_component`](super::component::fetch_component).
pub trait ComponentLookup {
    /// The identity of the entity.
    fn entity_id(&self) -> EntityId;

    /// Whether the entity currently has a component of type `ty`.
    fn has_component(&self, ty: ComponentType) -> bool;

    /// The component of type `ty`, if present.
    fn component_erased(&self, ty: ComponentType) -> Option<ErasedComponent>;
}

/// Receives component-level change notifications for an entity.
///
/// `component_added` is invoked after the component is attached and
/// `component_removed` after it is detached.
pub trait EntityObserver {
    /// A component of type `ty` was attached to `entity`.
    ///
    /// # Errors
    ///
    /// Propagates any error raised while matching the entity.
    fn component_added(&mut self, entity: &dyn ComponentLookup, ty: ComponentType)
        -> FamilyResult<()>;

    /// A component of type `ty` was detached from `entity`.
    fn component_removed(&mut self, entity: &dyn ComponentLookup, ty: ComponentType);
}

/// An entity: an identity plus a map from component type to instance.
///
/// Component instances are shared (`Arc`) so nodes can hold references to
/// exactly the instance the entity held at match time.
#[derive(Clone, Debug)]
pub struct Entity {
    id: EntityId,
    components: HashMap<ComponentType, ErasedComponent>,
}

impl Entity {
    /// Creates an entity with no components.
    #[must_use]
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            components: HashMap::new(),
        }
    }

    /// Builder-style insert, for setting up entities in one expression.
    #[must_use]
    pub fn with<C: Component>(mut self, component: C) -> Self {
        self.insert(component);
        self
    }

    /// Returns the entity's ID.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the number of attached components.
    #[inline]
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Checks if the entity has a component of type `C`.
    #[inline]
    #[must_use]
    pub fn has<C: Component>(&self) -> bool {
        self.components.contains_key(&ComponentType::of::<C>())
    }

    /// Returns the shared component instance of type `C`.
    #[must_use]
    pub fn get<C: Component>(&self) -> Option<Arc<C>> {
        self.components
            .get(&ComponentType::of::<C>())
            .and_then(|c| Arc::clone(c).downcast::<C>().ok())
    }

    /// Attaches a component, returning the instance it replaced.
    ///
    /// No observer is notified.
    pub fn insert<C: Component>(&mut self, component: C) -> Option<Arc<C>> {
        self.insert_shared(Arc::new(component))
    }

    /// Attaches an already shared component, returning the instance it replaced.
    pub fn insert_shared<C: Component>(&mut self, component: Arc<C>) -> Option<Arc<C>> {
        self.components
            .insert(ComponentType::of::<C>(), component)
            .and_then(|old| old.downcast::<C>().ok())
    }

    /// Detaches the component of type `C`, returning it.
    ///
    /// No observer is notified.
    pub fn remove<C: Component>(&mut self) -> Option<Arc<C>> {
        self.components
            .remove(&ComponentType::of::<C>())
            .and_then(|old| old.downcast::<C>().ok())
    }

    /// Attaches a component and notifies `observer`.
    ///
    /// Replacing an existing instance is reported as a removal followed by an
    /// addition, so nodes bound to the old instance are rebuilt.
    ///
    /// # Errors
    ///
    /// Propagates the observer's error from `component_added`. The component
    /// stays attached either way.
    pub fn insert_observed<C: Component>(
        &mut self,
        component: C,
        observer: &mut dyn EntityObserver,
    ) -> FamilyResult<Option<Arc<C>>> {
        let ty = ComponentType::of::<C>();
        let replaced = self.insert(component);
        if replaced.is_some() {
            observer.component_removed(&*self, ty);
        }
        observer.component_added(&*self, ty)?;
        Ok(replaced)
    }

    /// Detaches the component of type `C` and notifies `observer` if one was
    /// attached.
    pub fn remove_observed<C: Component>(
        &mut self,
        observer: &mut dyn EntityObserver,
    ) -> Option<Arc<C>> {
        let removed = self.remove::<C>()?;
        observer.component_removed(&*self, ComponentType::of::<C>());
        Some(removed)
    }

    /// Iterates over the types of all attached components.
    pub fn component_types(&self) -> impl Iterator<Item = ComponentType> + '_ {
        self.components.keys().copied()
    }
}

impl ComponentLookup for Entity {
    #[inline]
    fn entity_id(&self) -> EntityId {
        self.id
    }

    #[inline]
    fn has_component(&self, ty: ComponentType) -> bool {
        self.components.contains_key(&ty)
    }

    #[inline]
    fn component_erased(&self, ty: ComponentType) -> Option<ErasedComponent> {
        self.components.get(&ty).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::fetch_component;

    #[derive(Debug, PartialEq)]
    struct Position(i32);

    #[derive(Debug, PartialEq)]
    struct Velocity(i32);

    #[derive(Default)]
    struct Recorder {
        added: Vec<ComponentType>,
        removed: Vec<ComponentType>,
    }

    impl EntityObserver for Recorder {
        fn component_added(
            &mut self,
            _entity: &dyn ComponentLookup,
            ty: ComponentType,
        ) -> FamilyResult<()> {
            self.added.push(ty);
            Ok(())
        }

        fn component_removed(&mut self, _entity: &dyn ComponentLookup, ty: ComponentType) {
            self.removed.push(ty);
        }
    }

    #[test]
    fn test_entity_id_roundtrip() {
        let id = EntityId::new(12345, 67890);
        assert_eq!(id.index(), 12345);
        assert_eq!(id.generation(), 67890);
        assert_eq!(id.to_string(), "12345v67890");
    }

    #[test]
    fn test_entity_components() {
        let mut entity = Entity::new(EntityId::new(0, 0));
        assert!(!entity.has::<Position>());

        assert!(entity.insert(Position(5)).is_none());
        assert!(entity.has::<Position>());
        assert!(entity.has_component(ComponentType::of::<Position>()));
        assert!(!entity.has_component(ComponentType::of::<Velocity>()));
        assert_eq!(*entity.get::<Position>().unwrap(), Position(5));

        let old = entity.insert(Position(6)).unwrap();
        assert_eq!(*old, Position(5));
        assert_eq!(entity.component_count(), 1);

        assert_eq!(*entity.remove::<Position>().unwrap(), Position(6));
        assert!(!entity.has::<Position>());
        assert!(entity.remove::<Position>().is_none());
    }

    #[test]
    fn test_lookup_returns_same_instance() {
        let entity = Entity::new(EntityId::new(1, 0)).with(Velocity(2));
        let a = entity.get::<Velocity>().unwrap();
        let b = fetch_component::<Velocity>(&entity).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(fetch_component::<Position>(&entity).is_none());
    }

    #[test]
    fn test_observed_mutations() {
        let mut recorder = Recorder::default();
        let mut entity = Entity::new(EntityId::new(2, 0));

        entity.insert_observed(Position(1), &mut recorder).unwrap();
        assert_eq!(recorder.added, vec![ComponentType::of::<Position>()]);
        assert!(recorder.removed.is_empty());

        // Replacement is reported as remove + add.
        entity.insert_observed(Position(2), &mut recorder).unwrap();
        assert_eq!(recorder.added.len(), 2);
        assert_eq!(recorder.removed, vec![ComponentType::of::<Position>()]);

        assert!(entity.remove_observed::<Velocity>(&mut recorder).is_none());
        assert_eq!(recorder.removed.len(), 1);

        assert!(entity.remove_observed::<Position>(&mut recorder).is_some());
        assert_eq!(recorder.removed.len(), 2);
    }
}
