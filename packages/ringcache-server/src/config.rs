//! Per-node startup configuration.
//!
//! Every field is settable as a CLI flag or, failing that, an environment
//! variable; CLI wins. Parsing happens once in `main` and the result is
//! wrapped in `Arc` for sharing.

use clap::Parser;
use ringcache_core::Node;

/// `capacity.max-entries` falls back to this when misconfigured (`<= 0`).
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// `PEER_TIMEOUT_MS` from the membership design -- a peer silent this long
/// is declared dead and dropped from the ring.
pub const PEER_TIMEOUT_MS: u64 = 15_000;

/// `HEARTBEAT_INTERVAL_MS` -- both the sender and sweeper tasks run at this
/// period, with zero initial delay.
pub const HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// TTL sweep cadence: one initial delay, then a fixed period.
pub const TTL_SWEEP_INITIAL_DELAY_MS: u64 = 60_000;
pub const TTL_SWEEP_PERIOD_MS: u64 = 5 * 60_000;

#[derive(Debug, Clone, Parser)]
#[command(name = "ringcache-server", about = "A partitioned in-memory cache node")]
pub struct ServerConfig {
    /// Stable identity of this node.
    #[arg(long, env = "NODE_ID")]
    pub node_id: String,

    /// Listening host, also used to construct this node's ring position.
    #[arg(long, env = "NODE_HOST", default_value = "0.0.0.0")]
    pub node_host: String,

    /// Listening port.
    #[arg(long, env = "NODE_PORT")]
    pub node_port: u16,

    /// Comma-separated `host:port` list, including self.
    #[arg(long, env = "PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Total copies per key (R >= 1).
    #[arg(long, env = "REPLICATION_FACTOR", default_value_t = 1)]
    pub replication_factor: usize,

    /// `LocalStore` LRU bound; `<= 0` falls back to `DEFAULT_MAX_ENTRIES`.
    #[arg(long, env = "MAX_ENTRIES", default_value_t = 1000)]
    pub max_entries: i64,

    /// Connect timeout for outbound peer data calls, in milliseconds.
    #[arg(long, env = "CONNECT_TIMEOUT_MS", default_value_t = 2_000)]
    pub connect_timeout_ms: u64,

    /// Read timeout for outbound peer data calls, in milliseconds.
    #[arg(long, env = "READ_TIMEOUT_MS", default_value_t = 5_000)]
    pub read_timeout_ms: u64,

    /// Timeout for outbound heartbeat calls, in milliseconds.
    #[arg(long, env = "HEARTBEAT_TIMEOUT_MS", default_value_t = 3_000)]
    pub heartbeat_timeout_ms: u64,
}

impl ServerConfig {
    /// This process's own identity as a ring `Node`.
    #[must_use]
    pub fn node(&self) -> Node {
        Node::new(self.node_id.clone(), self.node_host.clone(), self.node_port)
    }

    /// `max_entries`, normalized per the `MisconfiguredCapacity` rule.
    #[must_use]
    pub fn effective_max_entries(&self) -> usize {
        if self.max_entries <= 0 {
            tracing::warn!(
                configured = self.max_entries,
                fallback = DEFAULT_MAX_ENTRIES,
                "max_entries misconfigured, using default"
            );
            DEFAULT_MAX_ENTRIES
        } else {
            self.max_entries as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ServerConfig {
        ServerConfig {
            node_id: "n1".to_string(),
            node_host: "127.0.0.1".to_string(),
            node_port: 8080,
            peers: vec!["127.0.0.1:8080".to_string()],
            replication_factor: 2,
            max_entries: 1000,
            connect_timeout_ms: 2_000,
            read_timeout_ms: 5_000,
            heartbeat_timeout_ms: 3_000,
        }
    }

    #[test]
    fn node_derives_from_host_and_port() {
        let config = base_config();
        let node = config.node();
        assert_eq!(node.address(), "127.0.0.1:8080");
    }

    #[test]
    fn effective_max_entries_passes_through_valid_value() {
        let config = base_config();
        assert_eq!(config.effective_max_entries(), 1000);
    }

    #[test]
    fn effective_max_entries_falls_back_on_non_positive() {
        let mut config = base_config();
        config.max_entries = 0;
        assert_eq!(config.effective_max_entries(), DEFAULT_MAX_ENTRIES);

        config.max_entries = -5;
        assert_eq!(config.effective_max_entries(), DEFAULT_MAX_ENTRIES);
    }
}
