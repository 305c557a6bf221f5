//! # engine_value
//!
//! The networked-value layer of the engine core: replicated property cells
//! whose conflicting writes (server and clients) are resolved with logical
//! clocks, deterministically and independent of arrival order.
//!
//! This crate provides:
//!
//! - [`WriterSource`] — writer identity (`Server` or a named client) with the
//!   ranking used for tie-breaks.
//! - [`resolve`] / [`Acceptance`] — the pure conflict-resolution rule shared
//!   by values and entity authority.
//! - [`ValueMutation`] — the wire form of a write, MessagePack-encoded via
//!   [`codec`].
//! - [`ValueTypeAdapter`] — extension point converting rich types to and from
//!   the network-safe primitive representation (`serde_json::Value`).
//! - [`ValueRegistry`] — the per-game-instance arbiter of replicated state.

pub mod adapter;
pub mod codec;
pub mod error;
pub mod mutation;
pub mod registry;
pub mod resolve;
pub mod source;

pub use adapter::{SerdeAdapter, ValueTypeAdapter};
pub use error::ValueError;
pub use mutation::ValueMutation;
pub use registry::ValueRegistry;
pub use resolve::{Acceptance, resolve};
pub use source::WriterSource;
