//! Shared error vocabulary for the cache core and the node process built
//! around it.

use thiserror::Error;

/// Every failure mode specified for ring lookups, peer forwarding, and
/// configuration validation.
///
/// Variants map directly onto the error kinds: `RingEmpty`,
/// `PeerUnreachable`/`PeerTimeout`, `PeerErrorResponse`,
/// `MisconfiguredCapacity`, `MalformedPeerAddress`.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no nodes available in the hash ring")]
    RingEmpty,

    #[error("peer {address} unreachable: {source}")]
    PeerUnreachable {
        address: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("peer {address} timed out")]
    PeerTimeout { address: String },

    #[error("peer {address} returned {status}: {body}")]
    PeerErrorResponse {
        address: String,
        status: u16,
        body: String,
    },

    #[error("max_entries misconfigured, falling back to default")]
    MisconfiguredCapacity,

    #[error("malformed peer address: {address}")]
    MalformedPeerAddress { address: String },
}
