//! Entity lifecycle signals.
//!
//! Signals fire on the affected entity's router and, for the events external
//! systems consume (spawn, destroy, transform updates), also on the scene
//! router. Scope tokens bind each signal type to the receivers it is valid
//! on at compile time.

use engine_signal::{Signal, SignalOn};

use crate::entity::EntityId;

/// Scope token for per-entity routers.
pub struct EntityScope;

/// Scope token for the scene-level router.
pub struct SceneScope;

/// An entity finished its initialization phase and entered the tick loop.
#[derive(Debug, Clone)]
pub struct EntitySpawned {
    /// The promoted entity.
    pub entity: EntityId,
}

/// An entity was destroyed. Fires exactly once per destroyed node.
#[derive(Debug, Clone)]
pub struct EntityDestroyed {
    /// The destroyed entity.
    pub entity: EntityId,
}

/// A direct child of the receiving entity was destroyed.
#[derive(Debug, Clone)]
pub struct ChildDestroyed {
    /// The receiving parent.
    pub parent: EntityId,
    /// The destroyed child.
    pub child: EntityId,
}

/// An entity somewhere below the receiving entity was destroyed.
#[derive(Debug, Clone)]
pub struct DescendantDestroyed {
    /// The receiving ancestor.
    pub ancestor: EntityId,
    /// The destroyed descendant.
    pub descendant: EntityId,
}

/// The receiving entity was renamed.
#[derive(Debug, Clone)]
pub struct EntityRenamed {
    /// The renamed entity.
    pub entity: EntityId,
    /// The name before the rename.
    pub previous: String,
}

/// A direct child of the receiving entity was renamed.
#[derive(Debug, Clone)]
pub struct ChildRenamed {
    /// The receiving parent.
    pub parent: EntityId,
    /// The renamed child.
    pub child: EntityId,
}

/// An entity somewhere below the receiving entity was renamed.
#[derive(Debug, Clone)]
pub struct DescendantRenamed {
    /// The receiving ancestor.
    pub ancestor: EntityId,
    /// The renamed descendant.
    pub descendant: EntityId,
}

/// The receiving entity was moved to a new parent.
#[derive(Debug, Clone)]
pub struct EntityReparented {
    /// The moved entity.
    pub entity: EntityId,
    /// The parent before the move.
    pub previous_parent: Option<EntityId>,
}

/// A child was moved under the receiving entity.
#[derive(Debug, Clone)]
pub struct ChildReparented {
    /// The receiving parent.
    pub parent: EntityId,
    /// The child that arrived.
    pub child: EntityId,
}

/// An entity was reparented somewhere below the receiving entity.
#[derive(Debug, Clone)]
pub struct DescendantReparented {
    /// The receiving ancestor.
    pub ancestor: EntityId,
    /// The reparented descendant.
    pub descendant: EntityId,
}

/// The receiving entity's transforms were recomputed and are consistent.
///
/// Fires after the whole affected subtree has settled, never mid-propagation.
#[derive(Debug, Clone)]
pub struct EntityTransformUpdate {
    /// The entity whose transforms changed.
    pub entity: EntityId,
}

macro_rules! entity_signal {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Signal for $ty {}
            impl SignalOn<EntityScope> for $ty {}
        )+
    };
}

macro_rules! scene_signal {
    ($($ty:ty),+ $(,)?) => {
        $(impl SignalOn<SceneScope> for $ty {})+
    };
}

entity_signal!(
    EntitySpawned,
    EntityDestroyed,
    ChildDestroyed,
    DescendantDestroyed,
    EntityRenamed,
    ChildRenamed,
    DescendantRenamed,
    EntityReparented,
    ChildReparented,
    DescendantReparented,
    EntityTransformUpdate,
);

// Broadcast copies consumed by renderer-style collaborators.
scene_signal!(EntitySpawned, EntityDestroyed, EntityTransformUpdate);
