//! # Memory Management
//!
//! Node slot recycling for families.
//!
//! ## Design Philosophy
//!
//! Node records are allocated once and reused:
//! - Slots are addressed by generational handles, never raw addresses
//! - Released slots go to a free list instead of being dropped
//! - The pool grows to the peak live count and never shrinks

mod pool;

pub use pool::{DefaultNodePool, NodePool};
