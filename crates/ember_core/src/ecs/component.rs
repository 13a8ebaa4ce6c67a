//! # Component Types
//!
//! Components are plain data attached to entities. The core never mutates
//! them; it only reads them to bind node slots.
//!
//! Dispatch on component types uses a stable type tag (`ComponentType`)
//! backed by [`TypeId`], never runtime reflection.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use super::entity::ComponentLookup;

/// Marker trait for ECS components.
///
/// Any `'static + Send + Sync` type can be attached to an entity.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, PartialEq)]
/// struct Position { x: f32, y: f32 }
///
/// entity.insert(Position { x: 0.0, y: 0.0 });
/// ```
pub trait Component: Any + Send + Sync {}

impl<T: Any + Send + Sync> Component for T {}

/// A type-erased, shared component instance as stored on an entity.
pub type ErasedComponent = Arc<dyn Any + Send + Sync>;

/// Stable identifier for a component type.
///
/// Two tags compare equal if and only if they were created from the same
/// Rust type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
}

impl ComponentType {
    /// Returns the tag for component type `C`.
    #[inline]
    #[must_use]
    pub fn of<C: Component>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
        }
    }

    /// Returns the underlying [`TypeId`].
    #[inline]
    #[must_use]
    pub const fn type_id(self) -> TypeId {
        self.id
    }

    /// Returns the Rust type name, for diagnostics only.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.name)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Fetches the component of type `C` from any entity source.
///
/// Returns `None` if the entity has no such component, or if the stored
/// instance is not actually a `C`.
#[inline]
#[must_use]
pub fn fetch_component<C: Component>(entity: &dyn ComponentLookup) -> Option<Arc<C>> {
    entity
        .component_erased(ComponentType::of::<C>())?
        .downcast::<C>()
        .ok()
}
