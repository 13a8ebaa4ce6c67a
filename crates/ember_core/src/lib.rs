//! # Ember Core
//!
//! The matching and bookkeeping core of the Ember ECS runtime:
//! - Families maintain the live list of entities satisfying a shape
//! - Updates are event driven; nothing re-scans the entity population
//! - Node records are pooled to avoid per-frame allocation churn
//!
//! ## Architecture Rules
//!
//! 1. **Event driven** - Families change only on entity/component events
//! 2. **Pooled nodes** - Allocation is bounded by the peak match count
//! 3. **Safe iteration** - Locked lists defer mutations until unlock
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember_core::{ComponentMatchingFamily, Entity, EntityId};
//!
//! let mut family = ComponentMatchingFamily::<(Position, Velocity)>::new();
//! let entity = Entity::new(EntityId::new(0, 0))
//!     .with(Position::default())
//!     .with(Velocity::default());
//! family.entity_added(&entity)?;
//!
//! family.before_update();
//! for node in family.nodes() {
//!     let (position, velocity) = node.components();
//! }
//! family.after_update();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::FamilyConfig;
pub use ecs::{
    fetch_component, Component, ComponentLookup, ComponentMatchingFamily, ComponentType, Entity,
    EntityId, EntityObserver, ErasedComponent, Family, FamilySet, Node, NodeChange, NodeHandle,
    NodeList, NodeShape, Nodes,
};
pub use error::{FamilyError, FamilyResult};
pub use memory::{DefaultNodePool, NodePool};
