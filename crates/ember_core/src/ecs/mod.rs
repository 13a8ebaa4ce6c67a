//! # Entity Component System
//!
//! Incremental matching of entities into per-shape node lists.
//!
//! ## Design Philosophy
//!
//! - Families react to add/remove events; the entity population is never
//!   re-scanned
//! - Node records are recycled through a pool, addressed by generational
//!   handles
//! - Node lists can be locked while a consumer iterates them; mutations are
//!   deferred and replayed on unlock

mod component;
mod entity;
mod family;
mod node;
pub mod node_list;
mod registry;
mod shape;

pub use component::{fetch_component, Component, ComponentType, ErasedComponent};
pub use entity::{ComponentLookup, Entity, EntityId, EntityObserver};
pub use family::{ComponentMatchingFamily, Family, Nodes};
pub use node::{Node, NodeHandle};
pub use node_list::{NodeChange, NodeList};
pub use registry::FamilySet;
pub use shape::NodeShape;
