//! # engine_signal
//!
//! Typed publish/subscribe for the engine core.
//!
//! This crate provides:
//!
//! - [`Signal`] trait — marker for signal payload types.
//! - [`SignalOn`] trait — binds a signal type to the receiver scopes it is
//!   valid on, enforced at compile time.
//! - [`SignalRouter`] — per-receiver listener table with registration-order
//!   dispatch and handle-based revocation.
//! - [`ListenerHandle`] — explicit subscription handle, revoked
//!   deterministically instead of relying on weak references.

pub mod router;
pub mod signal;

pub use router::{ListenerHandle, SignalRouter};
pub use signal::{Signal, SignalOn};
