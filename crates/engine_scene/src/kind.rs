//! Entity kinds.
//!
//! Concrete entity specialisations (renderer-backed, physics-backed, UI) are
//! expressed as a type tag on a common entity struct rather than an
//! inheritance hierarchy. Subtype relationships are a parent chain on the
//! enum, so "all sprites" includes animated sprites and dispatch is a match.

use serde::{Deserialize, Serialize};

/// The capability tag of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// A bare tree node with no attached facet. The root kind.
    Empty,
    /// A renderer-backed entity with a static texture.
    Sprite,
    /// A sprite cycling through animation frames. Subtype of [`Sprite`](EntityKind::Sprite).
    AnimatedSprite,
    /// A physics-backed entity synchronised with the physics world.
    Rigidbody2D,
    /// A DOM-mounted UI panel host.
    UiPanel,
    /// A view anchor consumed by the renderer.
    Camera,
}

impl EntityKind {
    /// Every kind, for index walks.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Empty,
        EntityKind::Sprite,
        EntityKind::AnimatedSprite,
        EntityKind::Rigidbody2D,
        EntityKind::UiPanel,
        EntityKind::Camera,
    ];

    /// The kind this kind specialises, or `None` for the root kind.
    #[must_use]
    pub fn parent_kind(self) -> Option<EntityKind> {
        match self {
            EntityKind::Empty => None,
            EntityKind::AnimatedSprite => Some(EntityKind::Sprite),
            EntityKind::Sprite
            | EntityKind::Rigidbody2D
            | EntityKind::UiPanel
            | EntityKind::Camera => Some(EntityKind::Empty),
        }
    }

    /// Returns `true` if `self` is `other` or a (transitive) specialisation
    /// of it — the ancestry walk, not an exact match.
    #[must_use]
    pub fn is_subtype_of(self, other: EntityKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent_kind();
        }
        false
    }

    /// Stable lowercase name, used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Empty => "empty",
            EntityKind::Sprite => "sprite",
            EntityKind::AnimatedSprite => "animated_sprite",
            EntityKind::Rigidbody2D => "rigidbody2d",
            EntityKind::UiPanel => "ui_panel",
            EntityKind::Camera => "camera",
        }
    }
}
