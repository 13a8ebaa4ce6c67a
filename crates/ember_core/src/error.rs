//! # Family Error Types
//!
//! All errors that can occur while matching entities into families.

use thiserror::Error;

use crate::ecs::EntityId;

/// Errors that can occur in the matching core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FamilyError {
    /// An entity was added to a family that already tracks it.
    ///
    /// This is a bookkeeping defect in the caller's entity lifecycle, not a
    /// recoverable runtime condition.
    #[error("entity {entity} is already a member of family {family}")]
    DuplicateMembership {
        /// The entity that was added twice.
        entity: EntityId,
        /// The family that already tracks it.
        family: String,
    },

    /// The entity reported a component as present but the lookup failed.
    #[error("entity {entity} reports component {component} but it could not be fetched")]
    ComponentUnavailable {
        /// The entity being matched.
        entity: EntityId,
        /// Name of the first shape type that could not be fetched.
        component: &'static str,
    },

    /// The node pool cannot address another slot.
    #[error("node pool exhausted after {slots} slots")]
    PoolExhausted {
        /// Number of slots the pool already holds.
        slots: usize,
    },

    /// A family for this shape is already registered.
    #[error("a family for shape {shape} is already registered")]
    ShapeAlreadyRegistered {
        /// The shape's display name.
        shape: String,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file could not be read.
    #[error("failed to read configuration {path}: {reason}")]
    ConfigRead {
        /// The file path.
        path: String,
        /// The underlying I/O error message.
        reason: String,
    },
}

/// Result type for family operations.
pub type FamilyResult<T> = Result<T, FamilyError>;
