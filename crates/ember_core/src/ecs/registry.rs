//! # Family Set
//!
//! Fans entity and component events out to every registered family, one
//! family per shape, and brackets updates with the lock protocol.

use std::any::TypeId;
use std::collections::HashMap;

use super::component::ComponentType;
use super::entity::{ComponentLookup, EntityObserver};
use super::family::{ComponentMatchingFamily, Family};
use super::shape::NodeShape;
use crate::error::{FamilyError, FamilyResult};
use crate::memory::{DefaultNodePool, NodePool};

/// A set of families of different shapes driven together.
///
/// # Example
///
/// ```rust,ignore
/// let mut families = FamilySet::new();
/// families.insert(ComponentMatchingFamily::<(Position, Velocity)>::new(), &[])?;
///
/// families.entity_added(&entity)?;
///
/// families.tick(|families| {
///     let movers = families.family::<(Position, Velocity)>().unwrap();
///     for node in movers.nodes() { /* ... */ }
/// });
/// ```
#[derive(Default)]
pub struct FamilySet {
    /// Families in registration order.
    families: Vec<Box<dyn Family>>,
    /// Shape type -> index into `families`.
    by_shape: HashMap<TypeId, usize>,
}

impl FamilySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered families.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Whether no family is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Whether a family for shape `S` is registered.
    #[must_use]
    pub fn contains<S: NodeShape>(&self) -> bool {
        self.by_shape.contains_key(&TypeId::of::<S>())
    }

    /// Registers `family` and feeds it every entity in `existing`.
    ///
    /// # Errors
    ///
    /// - [`FamilyError::ShapeAlreadyRegistered`] if shape `S` already has a
    ///   family; the set is unchanged.
    /// - Any error raised while adding `existing`; the family is not
    ///   registered.
    pub fn insert<S, P>(
        &mut self,
        mut family: ComponentMatchingFamily<S, P>,
        existing: &[&dyn ComponentLookup],
    ) -> FamilyResult<()>
    where
        S: NodeShape,
        P: NodePool<S> + 'static,
    {
        let key = TypeId::of::<S>();
        if self.by_shape.contains_key(&key) {
            return Err(FamilyError::ShapeAlreadyRegistered { shape: S::name() });
        }

        for entity in existing {
            family.entity_added(*entity)?;
        }

        tracing::debug!(
            "Registered family {} with {} initial nodes",
            family.name(),
            family.len()
        );
        self.by_shape.insert(key, self.families.len());
        self.families.push(Box::new(family));
        Ok(())
    }

    /// The family for shape `S` using the default pool.
    #[must_use]
    pub fn family<S: NodeShape>(&self) -> Option<&ComponentMatchingFamily<S>> {
        self.family_with_pool::<S, DefaultNodePool<S>>()
    }

    /// Mutable access to the family for shape `S` using the default pool.
    #[must_use]
    pub fn family_mut<S: NodeShape>(&mut self) -> Option<&mut ComponentMatchingFamily<S>> {
        self.family_with_pool_mut::<S, DefaultNodePool<S>>()
    }

    /// The family for shape `S` using pool type `P`.
    #[must_use]
    pub fn family_with_pool<S, P>(&self) -> Option<&ComponentMatchingFamily<S, P>>
    where
        S: NodeShape,
        P: NodePool<S> + 'static,
    {
        let index = *self.by_shape.get(&TypeId::of::<S>())?;
        self.families[index].as_any().downcast_ref()
    }

    /// Mutable access to the family for shape `S` using pool type `P`.
    #[must_use]
    pub fn family_with_pool_mut<S, P>(&mut self) -> Option<&mut ComponentMatchingFamily<S, P>>
    where
        S: NodeShape,
        P: NodePool<S> + 'static,
    {
        let index = *self.by_shape.get(&TypeId::of::<S>())?;
        self.families[index].as_any_mut().downcast_mut()
    }

    /// Unregisters the family for shape `S`, cleaning it up.
    ///
    /// Returns whether a family was removed.
    pub fn remove<S: NodeShape>(&mut self) -> bool {
        let Some(index) = self.by_shape.remove(&TypeId::of::<S>()) else {
            return false;
        };

        let mut family = self.families.remove(index);
        family.clean_up();
        for slot in self.by_shape.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }

        tracing::debug!("Removed family {}", family.name());
        true
    }

    /// Iterates the registered families in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Family> + '_ {
        self.families.iter().map(|f| &**f)
    }

    /// Forwards `entity_added` to every family.
    ///
    /// # Errors
    ///
    /// Returns the first family error; later families are not notified.
    pub fn entity_added(&mut self, entity: &dyn ComponentLookup) -> FamilyResult<()> {
        for family in &mut self.families {
            family.entity_added(entity)?;
        }
        Ok(())
    }

    /// Forwards `entity_removed` to every family.
    pub fn entity_removed(&mut self, entity: &dyn ComponentLookup) {
        for family in &mut self.families {
            family.entity_removed(entity);
        }
    }

    /// Forwards `component_added` to every family.
    ///
    /// # Errors
    ///
    /// Returns the first family error; later families are not notified.
    pub fn component_added(
        &mut self,
        entity: &dyn ComponentLookup,
        ty: ComponentType,
    ) -> FamilyResult<()> {
        for family in &mut self.families {
            family.component_added(entity, ty)?;
        }
        Ok(())
    }

    /// Forwards `component_removed` to every family.
    pub fn component_removed(&mut self, entity: &dyn ComponentLookup, ty: ComponentType) {
        for family in &mut self.families {
            family.component_removed(entity, ty);
        }
    }

    /// Locks every family's node list.
    pub fn before_update(&mut self) {
        for family in &mut self.families {
            family.before_update();
        }
    }

    /// Unlocks every family's node list and flushes deferred mutations.
    pub fn after_update(&mut self) {
        for family in &mut self.families {
            family.after_update();
        }
    }

    /// Runs `update` between [`before_update`](Self::before_update) and
    /// [`after_update`](Self::after_update).
    pub fn tick<R>(&mut self, update: impl FnOnce(&mut Self) -> R) -> R {
        self.before_update();
        let result = update(self);
        self.after_update();
        result
    }
}

impl EntityObserver for FamilySet {
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
