//! Type adapters — the extension point for rich value types.
//!
//! A [`ValueTypeAdapter`] converts between a Rust type and the network-safe
//! primitive representation (`serde_json::Value`) that flows through the
//! clocked-register mechanism. Plain serde-friendly types use
//! [`SerdeAdapter`]; external modules supply custom adapters for types that
//! need one (entity references, texture handles, enums with wire-stable
//! encodings).

use std::any::Any;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Converts a value type to and from its primitive wire representation.
///
/// Adapter errors are reported as strings; the registry attaches the value id
/// and surfaces them as
/// [`ValueError::Adapter`](crate::error::ValueError::Adapter), fatal for the
/// single message that carried the malformed primitive.
pub trait ValueTypeAdapter: 'static {
    /// The Rust-side value type.
    type Value: 'static;

    /// Convert a value to its primitive representation.
    fn convert_to_primitive(&self, value: &Self::Value) -> Result<Value, String>;

    /// Reconstruct a value from its primitive representation.
    fn convert_from_primitive(&self, primitive: &Value) -> Result<Self::Value, String>;
}

/// Default adapter for types that already serialise cleanly through serde.
pub struct SerdeAdapter<T>(PhantomData<T>);

impl<T> SerdeAdapter<T> {
    /// Create the adapter.
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for SerdeAdapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned + 'static> ValueTypeAdapter for SerdeAdapter<T> {
    type Value = T;

    fn convert_to_primitive(&self, value: &T) -> Result<Value, String> {
        serde_json::to_value(value).map_err(|e| e.to_string())
    }

    fn convert_from_primitive(&self, primitive: &Value) -> Result<T, String> {
        serde_json::from_value(primitive.clone()).map_err(|e| e.to_string())
    }
}

/// Object-safe adapter wrapper stored inside registry cells.
pub(crate) trait ErasedAdapter {
    fn to_primitive(&self, data: &dyn Any) -> Result<Value, String>;
    fn from_primitive(&self, primitive: &Value) -> Result<Box<dyn Any>, String>;
}

pub(crate) struct Erased<A>(pub A);

impl<A: ValueTypeAdapter> ErasedAdapter for Erased<A> {
    fn to_primitive(&self, data: &dyn Any) -> Result<Value, String> {
        let value = data
            .downcast_ref::<A::Value>()
            .ok_or_else(|| "cell data does not match adapter type".to_string())?;
        self.0.convert_to_primitive(value)
    }

    fn from_primitive(&self, primitive: &Value) -> Result<Box<dyn Any>, String> {
        let value = self.0.convert_from_primitive(primitive)?;
        Ok(Box::new(value))
    }
}
