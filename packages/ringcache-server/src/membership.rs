//! Heartbeat-based failure detector and ring membership manager.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use ringcache_core::{HashRing, Node};

use crate::config::{HEARTBEAT_INTERVAL_MS, PEER_TIMEOUT_MS};
use crate::peer::{HeartbeatBody, PeerClient};
use crate::scheduler::PeriodicTask;
use crate::service::ManagedService;
use crate::store::now_ms;

/// What `Membership` knows about one peer: the last `Node` it identified
/// itself as, and when it was last heard from.
#[derive(Clone)]
struct PeerRecord {
    node: Node,
    last_seen_ms: u64,
}

/// Heartbeat sender, timeout sweeper, and the `peerLastSeen` table they
/// share, keyed by `address` (not node id -- a peer is known by its address
/// before its first heartbeat tells us its id).
pub struct Membership {
    local_node: Node,
    ring: Arc<HashRing>,
    peer_client: Arc<PeerClient>,
    peer_last_seen: DashMap<String, PeerRecord>,
    tasks: Mutex<Vec<PeriodicTask>>,
}

impl Membership {
    #[must_use]
    pub fn new(local_node: Node, configured_peers: &[String], ring: Arc<HashRing>, peer_client: Arc<PeerClient>) -> Self {
        let peer_last_seen = DashMap::new();
        let now = now_ms();
        for address in configured_peers {
            if *address == local_node.address() {
                continue;
            }
            match Node::parse_address(address) {
                Some((host, port)) => {
                    peer_last_seen.insert(
                        address.clone(),
                        PeerRecord {
                            node: Node::new(address.clone(), host, port),
                            last_seen_ms: now,
                        },
                    );
                }
                None => tracing::warn!(address, "malformed peer address, skipping"),
            }
        }

        Self {
            local_node,
            ring,
            peer_client,
            peer_last_seen,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Addresses currently considered live (within `PEER_TIMEOUT_MS`),
    /// including those not yet in the ring.
    #[must_use]
    pub fn live_peer_addresses(&self) -> Vec<String> {
        let now = now_ms();
        self.peer_last_seen
            .iter()
            .filter(|entry| now.saturating_sub(entry.last_seen_ms) <= PEER_TIMEOUT_MS)
            .map(|entry| entry.key().clone())
            .collect()
    }

    #[must_use]
    pub fn last_heartbeat_received_ms(&self) -> Option<u64> {
        self.peer_last_seen.iter().map(|entry| entry.last_seen_ms).max()
    }

    /// Handles an inbound heartbeat: refreshes `peerLastSeen` and, if the
    /// sender isn't already in the ring, admits it. This is the only path
    /// by which a previously-unknown or recovered peer joins the ring.
    pub fn receive_heartbeat(&self, sender: Node) {
        let now = now_ms();
        self.peer_last_seen.insert(
            sender.address(),
            PeerRecord {
                node: sender.clone(),
                last_seen_ms: now,
            },
        );
        if !self.ring.contains(&sender) {
            self.ring.add_physical(sender);
        }
    }

    fn send_heartbeats(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let targets: Vec<Node> = self
            .peer_last_seen
            .iter()
            .map(|entry| entry.node.clone())
            .collect();
        let peer_client = self.peer_client.clone();
        let local = self.local_node.clone();

        async move {
            let body = HeartbeatBody {
                node_id: local.id.clone(),
                node_host: local.host.clone(),
                node_port: local.port,
                timestamp: now_ms(),
            };
            for target in targets {
                let peer_client = peer_client.clone();
                let body = HeartbeatBody {
                    node_id: body.node_id.clone(),
                    node_host: body.node_host.clone(),
                    node_port: body.node_port,
                    timestamp: body.timestamp,
                };
                tokio::spawn(async move {
                    peer_client.send_heartbeat(&target, &body).await;
                });
            }
        }
    }

    fn sweep_timed_out_peers(&self) {
        let now = now_ms();
        let timed_out: Vec<(String, Node)> = self
            .peer_last_seen
            .iter()
            .filter(|entry| now.saturating_sub(entry.last_seen_ms) > PEER_TIMEOUT_MS)
            .map(|entry| (entry.key().clone(), entry.node.clone()))
            .collect();

        for (address, node) in timed_out {
            self.peer_last_seen.remove(&address);
            self.ring.remove_physical(&node);
            tracing::info!(peer = %node, "peer timed out, removed from ring");
        }
    }

    /// Starts the sender and sweeper tasks. Must only be called after the
    /// local node has already been added to the ring.
    pub fn start_tasks(self: &Arc<Self>) {
        let period = Duration::from_millis(HEARTBEAT_INTERVAL_MS);

        let sender_self = self.clone();
        let sender = PeriodicTask::spawn(Duration::ZERO, period, move || sender_self.send_heartbeats());

        let sweeper_self = self.clone();
        let sweeper = PeriodicTask::spawn(Duration::ZERO, period, move || {
            let sweeper_self = sweeper_self.clone();
            async move { sweeper_self.sweep_timed_out_peers() }
        });

        *self.tasks.lock() = vec![sender, sweeper];
    }
}

#[async_trait]
impl ManagedService for Membership {
    fn name(&self) -> &'static str {
        "membership"
    }

    async fn init(&self) -> anyhow::Result<()> {
        // The local node joins the ring here, before `start_tasks` runs the
        // sender/sweeper -- startup ordering the spec requires explicitly.
        self.ring.add_physical(self.local_node.clone());
        Ok(())
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        for task in self.tasks.lock().drain(..) {
            task.cancel();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<Membership>, Arc<HashRing>) {
        let local = Node::new("n0", "127.0.0.1", 8080);
        let ring = Arc::new(HashRing::new(2));
        ring.add_physical(local.clone());
        let peer_client = Arc::new(PeerClient::new(1_000, 1_000, 1_000));
        let peers = vec!["127.0.0.1:8080".to_string(), "127.0.0.1:8081".to_string()];
        let membership = Arc::new(Membership::new(local, &peers, ring.clone(), peer_client));
        (membership, ring)
    }

    #[test]
    fn seeds_configured_peers_excluding_self() {
        let (membership, _ring) = setup();
        assert_eq!(membership.peer_last_seen.len(), 1);
        assert!(membership.peer_last_seen.contains_key("127.0.0.1:8081"));
    }

    #[test]
    fn receive_heartbeat_admits_previously_unknown_sender() {
        let (membership, ring) = setup();
        let sender = Node::new("n2", "127.0.0.1", 8082);
        membership.receive_heartbeat(sender.clone());
        assert!(ring.contains(&sender));
    }

    #[test]
    fn receive_heartbeat_updates_last_seen() {
        let (membership, _ring) = setup();
        let sender = Node::new("n1", "127.0.0.1", 8081);
        membership.receive_heartbeat(sender);
        let record = membership.peer_last_seen.get("127.0.0.1:8081").unwrap();
        assert!(now_ms() - record.last_seen_ms < 1_000);
    }

    #[test]
    fn sweep_removes_timed_out_peer_from_ring_and_table() {
        let (membership, ring) = setup();
        let sender = Node::new("n1", "127.0.0.1", 8081);
        membership.receive_heartbeat(sender.clone());
        assert!(ring.contains(&sender));

        // Force the record stale by rewriting its timestamp far in the past.
        membership.peer_last_seen.insert(
            sender.address(),
            PeerRecord { node: sender.clone(), last_seen_ms: 0 },
        );

        membership.sweep_timed_out_peers();
        assert!(!ring.contains(&sender));
        assert!(!membership.peer_last_seen.contains_key(&sender.address()));
    }

    #[test]
    fn live_peer_addresses_excludes_timed_out_peers() {
        let (membership, _ring) = setup();
        let sender = Node::new("n1", "127.0.0.1", 8081);
        membership.receive_heartbeat(sender.clone());
        assert!(membership.live_peer_addresses().contains(&sender.address()));

        membership.peer_last_seen.insert(
            sender.address(),
            PeerRecord { node: sender.clone(), last_seen_ms: 0 },
        );
        assert!(!membership.live_peer_addresses().contains(&sender.address()));
    }
}
