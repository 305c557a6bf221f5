//! Writer identity and ranking.

use serde::{Deserialize, Serialize};

/// The identity of a writer proposing a replicated-state change.
///
/// Every game instance stamps its own source onto locally originated writes.
/// The server is a distinguished identity; clients carry a connection
/// identifier string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriterSource {
    /// The authoritative server process.
    Server,
    /// A connected client, identified by its connection id.
    Client(String),
}

impl WriterSource {
    /// Returns `true` if this writer wins a same-clock conflict against
    /// `other`.
    ///
    /// The server outranks any client. Between two clients the
    /// lexicographically greater identity string wins, raw string ordering
    /// with no normalisation. Equal identities never outrank each other, so
    /// a same-clock write from the same writer is dropped.
    #[must_use]
    pub fn outranks(&self, other: &WriterSource) -> bool {
        match (self, other) {
            (WriterSource::Server, WriterSource::Server) => false,
            (WriterSource::Server, WriterSource::Client(_)) => true,
            (WriterSource::Client(_), WriterSource::Server) => false,
            (WriterSource::Client(a), WriterSource::Client(b)) => a > b,
        }
    }

    /// Returns `true` for the server identity.
    #[must_use]
    pub fn is_server(&self) -> bool {
        matches!(self, WriterSource::Server)
    }
}

impl std::fmt::Display for WriterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterSource::Server => write!(f, "server"),
            WriterSource::Client(id) => write!(f, "client:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_outranks_any_client() {
        let server = WriterSource::Server;
        let client = WriterSource::Client("zzz".to_string());
        assert!(server.outranks(&client));
        assert!(!client.outranks(&server));
    }

    #[test]
    fn test_clients_rank_lexicographically() {
        let abc = WriterSource::Client("abc".to_string());
        let xyz = WriterSource::Client("xyz".to_string());
        assert!(xyz.outranks(&abc));
        assert!(!abc.outranks(&xyz));
    }

    #[test]
    fn test_equal_identities_never_outrank() {
        let a = WriterSource::Client("abc".to_string());
        let b = WriterSource::Client("abc".to_string());
        assert!(!a.outranks(&b));
        assert!(!WriterSource::Server.outranks(&WriterSource::Server));
    }

    #[test]
    fn test_display() {
        assert_eq!(WriterSource::Server.to_string(), "server");
        assert_eq!(
            WriterSource::Client("c1".to_string()).to_string(),
            "client:c1"
        );
    }
}
