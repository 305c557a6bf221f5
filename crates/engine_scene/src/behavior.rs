//! The attached-logic seam.
//!
//! Behaviors are the external collaborator hook: game logic, renderer sync,
//! and physics sync all attach here. Callbacks return `anyhow::Result` so a
//! failing behavior is caught and logged by the tick driver without
//! interrupting siblings or parent-level bookkeeping.

use anyhow::Result;

use crate::entity::EntityId;
use crate::scene::Scene;

/// Per-tick timing passed to behavior callbacks.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Monotonically increasing tick counter.
    pub tick_id: u64,
    /// Delta time since the last tick, in seconds.
    pub dt: f64,
    /// Interpolation fraction within the current tick, `0.0..=1.0`. Only
    /// meaningful during the interpolate phase.
    pub alpha: f64,
}

/// A logic module attached to an entity.
///
/// Callbacks receive the scene and the owning entity's id; during a callback
/// the behavior list of that entity is temporarily detached, so behaviors may
/// freely mutate the tree — including destroying their own entity.
#[allow(unused_variables)]
pub trait Behavior: 'static {
    /// Short name used in error logs.
    fn name(&self) -> &'static str {
        "behavior"
    }

    /// Called once when the owning entity transitions `Constructed → Spawned`.
    ///
    /// # Errors
    ///
    /// Errors are logged and do not abort the promotion of other entities.
    fn on_spawn(&mut self, scene: &mut Scene, entity: EntityId) -> Result<()> {
        Ok(())
    }

    /// Called every tick before the tick phase, whole subtree first.
    ///
    /// # Errors
    ///
    /// Errors are logged per entity and never abort the frame.
    fn pre_tick(&mut self, scene: &mut Scene, entity: EntityId, ctx: &TickContext) -> Result<()> {
        Ok(())
    }

    /// Called every tick.
    ///
    /// # Errors
    ///
    /// Errors are logged per entity and never abort the frame.
    fn tick(&mut self, scene: &mut Scene, entity: EntityId, ctx: &TickContext) -> Result<()> {
        Ok(())
    }

    /// Called between ticks with the render interpolation fraction.
    ///
    /// # Errors
    ///
    /// Errors are logged per entity and never abort the frame.
    fn interpolate(&mut self, scene: &mut Scene, entity: EntityId, ctx: &TickContext) -> Result<()> {
        Ok(())
    }

    /// Called when the owning entity is destroyed. Infallible: teardown
    /// always completes.
    fn on_destroy(&mut self) {}
}
