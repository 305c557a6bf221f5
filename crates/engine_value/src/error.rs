//! Value-layer error types.

/// Errors from registry operations and the mutation codec.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// A value id was registered twice.
    #[error("value '{0}' is already registered")]
    DuplicateValue(String),

    /// A value id was not found in the registry.
    #[error("value '{0}' is not registered")]
    UnknownValue(String),

    /// A typed access did not match the cell's stored type.
    #[error("value '{0}' holds a different type")]
    TypeMismatch(String),

    /// A type adapter rejected a primitive during (de)serialisation. Fatal
    /// for the single message that carried it, not for the registry.
    #[error("adapter error on value '{value_id}': {message}")]
    Adapter {
        /// The value the malformed primitive was addressed to.
        value_id: String,
        /// Adapter-provided description of the failure.
        message: String,
    },

    /// Failed to encode a mutation to MessagePack.
    #[error("failed to encode mutation: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode a mutation from MessagePack.
    #[error("failed to decode mutation: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
