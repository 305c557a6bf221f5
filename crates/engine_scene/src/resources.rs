//! Resource URI resolution seam.
//!
//! Asset loading is an external collaborator: the core only maps engine URIs
//! (`res://`, `cloud://`) to concrete fetch URLs through whatever resolver
//! the host installs, typically from a behavior's spawn hook. Nothing in the
//! core awaits the actual fetch.

use anyhow::Result;

/// Maps engine resource URIs to concrete fetch URLs.
pub trait ResourceResolver {
    /// Resolve a `res://` / `cloud://` style URI.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown schemes or unresolvable resources.
    fn resolve_resource(&self, uri: &str) -> Result<String>;
}
