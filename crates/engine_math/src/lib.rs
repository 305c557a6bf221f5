//! # engine_math
//!
//! Math types for the 2D engine core. Re-exports [`glam`] for linear algebra
//! and defines the engine [`Transform`] together with the pure local↔world
//! composition functions used by transform propagation and hit-testing.

pub mod transform;

// Re-export glam types for convenience.
pub use glam::{Mat2, Vec2};

pub use transform::{
    Transform, local_to_world, point_local_to_world, point_world_to_local, world_to_local,
};
