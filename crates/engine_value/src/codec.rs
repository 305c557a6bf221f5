//! MessagePack codec helpers.
//!
//! Thin wrappers around `rmp-serde` for encoding and decoding mutations. All
//! replicated-state payloads use MessagePack for compact binary
//! serialisation; the transport that carries them is out of scope.

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`ValueError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ValueError> {
    rmp_serde::to_vec(value).map_err(ValueError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`ValueError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, ValueError> {
    rmp_serde::from_slice(bytes).map_err(ValueError::Decode)
}
