//! Signal marker traits.
//!
//! A signal is any `'static` payload type. Signals declare which receiver
//! scopes they are valid on by implementing [`SignalOn<R>`] — subscribing or
//! firing a signal on a router of the wrong scope is a type error, not a
//! runtime check.

/// Marker trait for signal payload types.
pub trait Signal: 'static {}

/// Marks a signal as valid on receivers of scope `R`.
///
/// `R` is a zero-sized scope token (e.g. an entity scope or a scene scope)
/// defined by the crate that owns the receiver. A signal that is meaningful
/// on more than one receiver kind implements this trait once per scope.
pub trait SignalOn<R>: Signal {}
