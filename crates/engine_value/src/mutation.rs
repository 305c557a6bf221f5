//! The wire form of a replicated write.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::source::WriterSource;

/// One proposed write to a value cell, as sent over the network.
///
/// The payload is the value's network-safe primitive representation (see
/// [`ValueTypeAdapter`](crate::adapter::ValueTypeAdapter)); the clock and
/// source drive conflict resolution on receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueMutation {
    /// The target value cell's registry identifier.
    pub value_id: String,
    /// The proposed logical clock (writer's last observed clock plus one).
    pub clock: u32,
    /// The proposing writer.
    pub source: WriterSource,
    /// The primitive representation of the new value.
    pub data: Value,
}
