//! # Node Shapes
//!
//! A shape is the fixed, ordered tuple of component types a family requires.
//! Shapes are Rust tuples of component types, so the slot count `K` is known
//! at compile time:
//!
//! ```rust,ignore
//! type Movement = (Position, Velocity);
//! let family = ComponentMatchingFamily::<Movement>::new();
//! ```

use std::sync::Arc;

use super::component::{fetch_component, Component, ComponentType};
use super::entity::ComponentLookup;

/// An ordered tuple of required component types.
pub trait NodeShape: 'static {
    /// The bound component references, one `Arc` per slot in declared order.
    type Components: Clone + Send + Sync;

    /// Number of slots (`K`).
    const ARITY: usize;

    /// The required component types in declared order.
    fn component_types() -> Vec<ComponentType>;

    /// Binds every slot from `entity`.
    ///
    /// Returns `None` if any required component is missing.
    fn fetch(entity: &dyn ComponentLookup) -> Option<Self::Components>;

    /// Human readable shape name, e.g. `(Position, Velocity)`.
    fn name() -> String {
        let names: Vec<&str> = Self::component_types()
            .into_iter()
            .map(|ty| short_name(ty.name()))
            .collect();
        format!("({})", names.join(", "))
    }
}

/// Strips the module path from a type name.
fn short_name(full: &str) -> &str {
    full.rsplit("::").next().unwrap_or(full)
}

macro_rules! shape_tuple {
    ($head_ty:ident) => {
        impl_shape_tuple!($head_ty);
    };
    ($head_ty:ident, $( $tail_ty:ident ),*) => (
        impl_shape_tuple!($head_ty, $( $tail_ty ),*);
        shape_tuple!($( $tail_ty ),*);
    );
}

macro_rules! impl_shape_tuple {
    ( $( $ty: ident ),* ) => {
        impl<$( $ty: Component ),*> NodeShape for ($( $ty, )*) {
            type Components = ($( Arc<$ty>, )*);

            const ARITY: usize = [$( stringify!($ty) ),*].len();

            fn component_types() -> Vec<ComponentType> {
                vec![$( ComponentType::of::<$ty>() ),*]
            }

            fn fetch(entity: &dyn ComponentLookup) -> Option<Self::Components> {
                Some(($( fetch_component::<$ty>(entity)?, )*))
            }
        }
    };
}

shape_tuple!(A, B, C, D, E, F, G, H);
