//! Request router / replication coordinator.
//!
//! Decides, for each operation, whether to serve locally, forward to the
//! key's primary, or (when local node is primary) write locally and
//! asynchronously fan out to replicas.

use std::sync::Arc;

use ringcache_core::{CacheError, CacheValue, HashRing, Node};

use crate::peer::PeerClient;
use crate::store::{LocalStore, StoreCounters};

pub struct Coordinator {
    local_node: Node,
    ring: Arc<HashRing>,
    store: Arc<LocalStore>,
    peer_client: Arc<PeerClient>,
}

impl Coordinator {
    #[must_use]
    pub fn new(local_node: Node, ring: Arc<HashRing>, store: Arc<LocalStore>, peer_client: Arc<PeerClient>) -> Self {
        Self {
            local_node,
            ring,
            store,
            peer_client,
        }
    }

    // ---- public surface (served behind /cache) ----

    pub async fn get(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let primary = self.ring.primary(key).ok_or(CacheError::RingEmpty)?;
        if primary == self.local_node {
            Ok(self.store.get(key))
        } else {
            self.peer_client.forward_get(&primary, key).await
        }
    }

    pub async fn put(&self, key: &str, value: CacheValue, ttl_ms: u64) -> Result<(), CacheError> {
        let primary = self.ring.primary(key).ok_or(CacheError::RingEmpty)?;
        if primary == self.local_node {
            self.primary_write(key, value, ttl_ms);
            Ok(())
        } else {
            self.peer_client.forward_put(&primary, key, value, ttl_ms).await
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let Some(primary) = self.ring.primary(key) else {
            // Deleting from an empty ring is a no-op, not an error.
            return Ok(());
        };
        if primary == self.local_node {
            self.primary_delete(key);
            Ok(())
        } else {
            self.peer_client.forward_delete(&primary, key).await
        }
    }

    /// Local view only -- not a cluster-wide scan. Named to mirror the
    /// wire-level `GET /cache/` it backs, which every node answers the
    /// same way: from its own store.
    #[must_use]
    pub fn get_all(&self) -> serde_json::Map<String, CacheValue> {
        self.store.snapshot()
    }

    // ---- stats, backing `GET /admin/stats` ----

    #[must_use]
    pub fn local_key_count(&self) -> usize {
        self.store.size()
    }

    #[must_use]
    pub fn local_memory_usage_bytes(&self) -> u64 {
        self.store.memory_usage_bytes()
    }

    #[must_use]
    pub fn store_counters(&self) -> StoreCounters {
        self.store.counters()
    }

    // ---- internal surface (served behind /internal/cache) ----

    pub fn on_internal_get(&self, key: &str) -> Option<CacheValue> {
        self.store.get(key)
    }

    pub fn on_internal_put(&self, key: &str, value: CacheValue, ttl_ms: u64) {
        match self.ring.primary(key) {
            Some(primary) if primary == self.local_node => self.primary_write(key, value, ttl_ms),
            _ => self.replica_write(key, value, ttl_ms),
        }
    }

    pub fn on_internal_delete(&self, key: &str) {
        match self.ring.primary(key) {
            Some(primary) if primary == self.local_node => self.primary_delete(key),
            _ => self.replica_delete(key),
        }
    }

    // ---- primary / replica paths ----

    fn primary_write(&self, key: &str, value: CacheValue, ttl_ms: u64) {
        self.store.put(key.to_string(), value.clone(), ttl_ms);

        let replicas = self.replica_fanout_targets(key);
        for replica in replicas {
            let peer_client = self.peer_client.clone();
            let key = key.to_string();
            let value = value.clone();
            tokio::spawn(async move {
                if let Err(err) = peer_client.forward_put(&replica, &key, value, ttl_ms).await {
                    tracing::warn!(peer = %replica, key, error = %err, "replication fan-out put failed");
                }
            });
        }
    }

    fn primary_delete(&self, key: &str) {
        self.store.delete(key);

        let replicas = self.replica_fanout_targets(key);
        for replica in replicas {
            let peer_client = self.peer_client.clone();
            let key = key.to_string();
            tokio::spawn(async move {
                if let Err(err) = peer_client.forward_delete(&replica, &key).await {
                    tracing::warn!(peer = %replica, key, error = %err, "replication fan-out delete failed");
                }
            });
        }
    }

    fn replica_write(&self, key: &str, value: CacheValue, ttl_ms: u64) {
        self.store.put(key.to_string(), value, ttl_ms);
    }

    fn replica_delete(&self, key: &str) {
        self.store.delete(key);
    }

    /// The replica set for `key`, minus the local node, capped at R-1.
    fn replica_fanout_targets(&self, key: &str) -> Vec<Node> {
        let mut replicas = self.ring.replica_set(key);
        replicas.retain(|n| n != &self.local_node);
        replicas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup(local_port: u16) -> Coordinator {
        let node = Node::new(format!("n{local_port}"), "127.0.0.1", local_port);
        let ring = Arc::new(HashRing::new(1));
        ring.add_physical(node.clone());
        let store = Arc::new(LocalStore::new(100));
        let peer_client = Arc::new(PeerClient::new(1_000, 1_000, 1_000));
        Coordinator::new(node, ring, store, peer_client)
    }

    #[tokio::test]
    async fn get_serves_locally_when_primary() {
        let coordinator = setup(8080);
        coordinator.put("k1", json!("v1"), 0).await.unwrap();
        assert_eq!(coordinator.get("k1").await.unwrap(), Some(json!("v1")));
    }

    #[tokio::test]
    async fn delete_on_empty_ring_is_a_no_op_success() {
        let node = Node::new("n1", "127.0.0.1", 8080);
        let ring = Arc::new(HashRing::new(1));
        let store = Arc::new(LocalStore::new(100));
        let peer_client = Arc::new(PeerClient::new(1_000, 1_000, 1_000));
        let coordinator = Coordinator::new(node, ring, store, peer_client);

        assert!(coordinator.delete("missing").await.is_ok());
    }

    #[tokio::test]
    async fn get_on_empty_ring_surfaces_ring_empty_error() {
        let node = Node::new("n1", "127.0.0.1", 8080);
        let ring = Arc::new(HashRing::new(1));
        let store = Arc::new(LocalStore::new(100));
        let peer_client = Arc::new(PeerClient::new(1_000, 1_000, 1_000));
        let coordinator = Coordinator::new(node, ring, store, peer_client);

        assert!(matches!(coordinator.get("k1").await, Err(CacheError::RingEmpty)));
    }

    #[tokio::test]
    async fn internal_put_writes_locally_when_primary() {
        let coordinator = setup(8080);
        coordinator.on_internal_put("k1", json!("v1"), 0);
        assert_eq!(coordinator.on_internal_get("k1"), Some(json!("v1")));
    }

    #[tokio::test]
    async fn get_all_returns_local_snapshot() {
        let coordinator = setup(8080);
        coordinator.put("k1", json!(1), 0).await.unwrap();
        coordinator.put("k2", json!(2), 0).await.unwrap();
        let all = coordinator.get_all();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn replica_fanout_targets_excludes_local_node() {
        let coordinator = setup(8080);
        let targets = coordinator.replica_fanout_targets("k1");
        assert!(targets.is_empty());
    }
}
