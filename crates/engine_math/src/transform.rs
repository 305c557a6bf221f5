//! 2D transform and space-conversion math.
//!
//! [`Transform`] represents position, rotation, non-uniform scale, and a
//! z-order scalar. The free functions compose a child's local transform with
//! its parent's world transform (and invert that composition exactly), which
//! is the whole of the propagation math the scene graph relies on.

use glam::{Mat2, Vec2};
use serde::{Deserialize, Serialize};

/// A 2D transform: position, rotation (radians), non-uniform scale, z-order.
///
/// Plain data — change notification is the scene graph's responsibility, not
/// the transform's.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    /// Position in the parent's space (or world space for a world transform).
    pub translation: Vec2,
    /// Rotation in radians, counter-clockwise.
    pub rotation: f32,
    /// Non-uniform scale. Components must be nonzero for inversion.
    pub scale: Vec2,
    /// Z-order scalar. Composes additively, like rotation.
    pub z: f32,
}

impl Transform {
    /// The identity transform: origin, no rotation, unit scale, z zero.
    pub const IDENTITY: Self = Self {
        translation: Vec2::ZERO,
        rotation: 0.0,
        scale: Vec2::ONE,
        z: 0.0,
    };

    /// Create a transform with the given translation and default
    /// rotation/scale/z.
    #[must_use]
    pub fn from_translation(translation: Vec2) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Create a transform with translation and rotation.
    #[must_use]
    pub fn from_translation_rotation(translation: Vec2, rotation: f32) -> Self {
        Self {
            translation,
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Translate by the given offset.
    #[must_use]
    pub fn translated(mut self, offset: Vec2) -> Self {
        self.translation += offset;
        self
    }

    /// Rotate by the given angle in radians.
    #[must_use]
    pub fn rotated(mut self, angle: f32) -> Self {
        self.rotation += angle;
        self
    }

    /// Apply a component-wise scale factor.
    #[must_use]
    pub fn scaled(mut self, factor: Vec2) -> Self {
        self.scale *= factor;
        self
    }

    /// Move to the given z-order.
    #[must_use]
    pub fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }

    /// The 2×2 rotation-scale matrix of this transform (no translation).
    #[must_use]
    pub fn rotation_scale(&self) -> Mat2 {
        Mat2::from_angle(self.rotation) * Mat2::from_diagonal(self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Compose a child's local transform with its parent's world transform.
///
/// World position is the local translation scaled by the parent, rotated by
/// the parent, then offset by the parent; scale multiplies component-wise;
/// rotation and z add.
#[must_use]
pub fn local_to_world(parent: &Transform, local: &Transform) -> Transform {
    Transform {
        translation: parent.translation
            + Mat2::from_angle(parent.rotation) * (local.translation * parent.scale),
        rotation: parent.rotation + local.rotation,
        scale: parent.scale * local.scale,
        z: parent.z + local.z,
    }
}

/// Recover a child's local transform from its world transform and the
/// parent's world transform.
///
/// Exact inverse of [`local_to_world`]: for any parent with nonzero scale
/// components, `world_to_local(p, &local_to_world(p, l))` reproduces `l`
/// within floating tolerance.
#[must_use]
pub fn world_to_local(parent: &Transform, world: &Transform) -> Transform {
    Transform {
        translation: (Mat2::from_angle(-parent.rotation)
            * (world.translation - parent.translation))
            / parent.scale,
        rotation: world.rotation - parent.rotation,
        scale: world.scale / parent.scale,
        z: world.z - parent.z,
    }
}

/// Convert a point from an entity's local space to world space.
///
/// Point-only composition: no rotation or z bookkeeping, just the 2×2
/// rotation-scale matrix plus translation. Used by spatial hit-testing.
#[must_use]
pub fn point_local_to_world(world: &Transform, point: Vec2) -> Vec2 {
    world.translation + Mat2::from_angle(world.rotation) * (point * world.scale)
}

/// Convert a point from world space into an entity's local space.
#[must_use]
pub fn point_world_to_local(world: &Transform, point: Vec2) -> Vec2 {
    (Mat2::from_angle(-world.rotation) * (point - world.translation)) / world.scale
}
