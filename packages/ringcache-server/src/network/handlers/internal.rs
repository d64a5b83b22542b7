//! Internal peer-to-peer endpoints, mounted at `/internal/cache`.
//!
//! These are never called by external clients -- only by other nodes'
//! `PeerClient`s forwarding a request or sending a heartbeat. Writes here
//! never fan out further: the coordinator recomputes the primary on receipt
//! and behaves as a replica write if it isn't.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use ringcache_core::Node;

use super::cache::PutRequest;
use super::AppState;
use crate::peer::HeartbeatBody;

pub async fn get_handler(State(state): State<AppState>, Path(key): Path<String>) -> impl IntoResponse {
    match state.coordinator.on_internal_get(&key) {
        Some(value) => (StatusCode::OK, Json(value)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn put_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<PutRequest>,
) -> StatusCode {
    state.coordinator.on_internal_put(&key, body.value, body.ttl_millis);
    StatusCode::OK
}

pub async fn delete_handler(State(state): State<AppState>, Path(key): Path<String>) -> StatusCode {
    state.coordinator.on_internal_delete(&key);
    StatusCode::NO_CONTENT
}

pub async fn heartbeat_handler(State(state): State<AppState>, Json(body): Json<HeartbeatBody>) -> StatusCode {
    let sender = Node::new(body.node_id, body.node_host, body.node_port);
    state.membership.receive_heartbeat(sender);
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Coordinator;
    use crate::membership::Membership;
    use crate::network::ShutdownController;
    use crate::peer::PeerClient;
    use crate::store::LocalStore;
    use ringcache_core::HashRing;
    use serde_json::json;
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
    async fn internal_put_then_get_round_trips() {
        let state = test_state();
        let status = put_handler(
            State(state.clone()),
            Path("k1".to_string()),
            Json(PutRequest { value: json!("v1"), ttl_millis: 0 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let response = get_handler(State(state), Path("k1".to_string())).await;
        assert_eq!(response.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn heartbeat_admits_sender_to_ring() {
        let state = test_state();
        let body = HeartbeatBody {
            node_id: "n2".to_string(),
            node_host: "127.0.0.1".to_string(),
            node_port: 8081,
            timestamp: 0,
        };
        let status = heartbeat_handler(State(state.clone()), Json(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.membership.live_peer_addresses().contains(&"127.0.0.1:8081".to_string()));
    }
}
