//! `GET /admin/stats` -- operator-facing snapshot of this node's state.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::store::total_process_memory_bytes;

pub async fn stats_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let node = state.config.node();
    let counters = state.coordinator.store_counters();
    let total_gets = counters.hits + counters.misses;
    let hit_ratio = if total_gets == 0 {
        0.0
    } else {
        counters.hits as f64 / total_gets as f64
    };

    Json(json!({
        "nodeId": node.id,
        "nodeAddress": node.address(),
        "status": "UP",
        "localKeyCount": state.coordinator.local_key_count(),
        "localMemoryUsageBytes": state.coordinator.local_memory_usage_bytes(),
        "totalJVMMemoryBytes": total_process_memory_bytes(),
        "cacheHitCount": counters.hits,
        "cacheMissCount": counters.misses,
        "cacheHitRatio": hit_ratio,
        "putCount": counters.puts,
        "deleteCount": counters.deletes,
        "lastHeartbeatReceivedMillis": state.membership.last_heartbeat_received_ms(),
        "activePeerAddresses": state.membership.live_peer_addresses(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Coordinator;
    use crate::membership::Membership;
    use crate::network::ShutdownController;
    use crate::peer::PeerClient;
    use crate::store::LocalStore;
    use ringcache_core::{HashRing, Node};
    use std::sync::Arc;
    use std::time::Instant;

    fn test_state() -> AppState {
        let node = Node::new("n1", "127.0.0.1", 8080);
        let ring = Arc::new(HashRing::new(1));
        ring.add_physical(node.clone());
        let peer_client = Arc::new(PeerClient::new(1_000, 1_000, 1_000));
        let store = Arc::new(LocalStore::new(10));
        let coordinator = Arc::new(Coordinator::new(node.clone(), ring.clone(), store, peer_client.clone()));
        let membership = Arc::new(Membership::new(node, &[], ring, peer_client));

        AppState {
            coordinator,
            membership,
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(crate::config::ServerConfig {
                node_id: "n1".to_string(),
                node_host: "127.0.0.1".to_string(),
                node_port: 8080,
                peers: vec![],
                replication_factor: 1,
                max_entries: 10,
                connect_timeout_ms: 1_000,
                read_timeout_ms: 1_000,
                heartbeat_timeout_ms: 1_000,
            }),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn stats_reports_node_identity_and_zeroed_counters() {
        let state = test_state();
        let response = stats_handler(State(state)).await;
        let json = response.0;
        assert_eq!(json["nodeId"], "n1");
        assert_eq!(json["nodeAddress"], "127.0.0.1:8080");
        assert_eq!(json["status"], "UP");
        assert_eq!(json["cacheHitCount"], 0);
        assert_eq!(json["cacheHitRatio"], 0.0);
        assert_eq!(json["activePeerAddresses"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn stats_reports_hit_ratio_after_gets() {
        let state = test_state();
        state.coordinator.put("k1", serde_json::json!(1), 0).await.unwrap();
        state.coordinator.get("k1").await.unwrap();
        state.coordinator.get("missing").await.unwrap();

        let response = stats_handler(State(state)).await;
        let json = response.0;
        assert_eq!(json["cacheHitCount"], 1);
        assert_eq!(json["cacheMissCount"], 1);
        assert_eq!(json["cacheHitRatio"], 0.5);
    }
}
