//! Scene-layer error types.
//!
//! These are the structural errors of the tree: they abort the operation
//! that raised them without corrupting the rest of the scene. Per-tick user
//! errors are not represented here — they are caught and logged at the
//! behavior boundary. Stale or outranked replicated writes are not errors at
//! all.

use engine_value::ValueError;

use crate::entity::{EntityId, EntityRef};
use crate::kind::EntityKind;

/// Errors raised by scene operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The entity id does not resolve to a live entity.
    #[error("{0} not found")]
    EntityNotFound(EntityId),

    /// A named-child lookup missed.
    #[error("no child named '{name}' under '{parent}'")]
    ChildNotFound {
        /// Path of the parent that was searched.
        parent: String,
        /// The requested child name.
        name: String,
    },

    /// Two entities presented the same stable ref. Indicates a ref collision
    /// bug; the registration aborts loudly instead of overwriting.
    #[error("duplicate entity ref {0}")]
    DuplicateRef(EntityRef),

    /// A network message addressed a ref with no live entity, usually one
    /// destroyed while the message was in flight.
    #[error("no live entity for ref {0}")]
    RefNotFound(EntityRef),

    /// An entity was cast to a kind it is not a subtype of.
    #[error("'{path}' is {actual:?}, not a subtype of {expected:?}")]
    KindMismatch {
        /// Path of the entity.
        path: String,
        /// The requested kind.
        expected: EntityKind,
        /// The entity's actual kind.
        actual: EntityKind,
    },

    /// Scene roots cannot be renamed, reparented, or destroyed.
    #[error("'{0}' is a scene root and cannot be moved, renamed, or destroyed")]
    RootImmutable(String),

    /// The requested reparent would make an entity its own ancestor.
    #[error("appending '{child}' under '{parent}' would create a cycle")]
    WouldCycle {
        /// Path of the prospective parent.
        parent: String,
        /// Path of the entity being moved.
        child: String,
    },

    /// A value-layer failure surfaced through a scene operation.
    #[error(transparent)]
    Value(#[from] ValueError),
}
