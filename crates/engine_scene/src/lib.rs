//! # engine_scene
//!
//! The entity tree at the heart of the 2D engine runtime: a hierarchical
//! entity model with local/global transform propagation, automatic sibling
//! name deduplication, secondary lookup indices, per-entity authority, and a
//! cooperative single-threaded tick driver.
//!
//! This crate provides:
//!
//! - [`Scene`] — the entity arena and every tree operation.
//! - [`EntityId`] / [`EntityRef`] — renameable path identity versus stable
//!   network identity.
//! - [`EntityDefinition`] — the declarative construction entry point.
//! - [`EntityStore`] — path/ref/kind lookups with nested root views; point
//!   queries live on [`Scene`], which owns the transforms.
//! - [`Behavior`] — the attached-logic seam, with per-child error recovery.
//! - Entity lifecycle signals (spawn, destroy, rename, reparent, transform
//!   update) consumed by renderers and physics wrappers.

pub mod authority;
pub mod behavior;
pub mod definition;
pub mod entity;
pub mod error;
pub mod kind;
pub mod naming;
pub mod resources;
pub mod scene;
pub mod signals;
pub mod store;

pub use authority::AuthorityMutation;
pub use behavior::{Behavior, TickContext};
pub use definition::EntityDefinition;
pub use entity::{EntityAllocator, EntityId, EntityRef};
pub use error::SceneError;
pub use kind::EntityKind;
pub use resources::ResourceResolver;
pub use scene::{LifecycleState, Scene};
pub use signals::{EntityScope, SceneScope};
pub use store::{EntityStore, SceneRoot};
