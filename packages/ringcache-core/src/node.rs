//! Node identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A peer in the cluster, identified by a stable id and a listening address.
///
/// Two nodes are equal iff all three fields match -- `Node` is used as a
/// map key in replica-set bookkeeping, so equality and hashing must agree
/// with that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl Node {
    #[must_use]
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port`, used both as the ring's vnode hash input and as the
    /// membership table's key.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parses a `host:port` pair into a `Node`, using the address itself as
    /// the id when the real id is not known (e.g. a peer discovered only by
    /// address before its first heartbeat names it).
    ///
    /// Returns `None` if `address` does not contain exactly one `:` with a
    /// valid trailing port -- callers should log and skip the peer
    /// (`MalformedPeerAddress`).
    #[must_use]
    pub fn parse_address(address: &str) -> Option<(String, u16)> {
        let (host, port) = address.rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        let port: u16 = port.parse().ok()?;
        Some((host.to_string(), port))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.id, self.address())
    }
}
