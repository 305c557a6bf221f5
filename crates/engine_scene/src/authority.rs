//! Entity authority.
//!
//! Authority is an optional exclusive-owner tag on an entity, replicated
//! with the identical clock discipline as values: proposals carry
//! `last observed + 1` and receipt-side resolution is order-independent.
//! Entities are addressed by stable ref on the wire so renames and reparents
//! never break an in-flight authority message.

use engine_value::WriterSource;
use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;

/// One proposed authority change, as sent over the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityMutation {
    /// Stable ref of the target entity.
    pub entity_ref: EntityRef,
    /// The proposed owner, or `None` to relinquish.
    pub owner: Option<WriterSource>,
    /// The proposed logical clock.
    pub clock: u32,
    /// The proposing writer.
    pub source: WriterSource,
}
