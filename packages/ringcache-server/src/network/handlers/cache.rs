//! Public cache endpoints, mounted at `/cache`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use ringcache_core::CacheValue;
use serde::Deserialize;

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct PutRequest {
    pub value: CacheValue,
    #[serde(rename = "ttlMillis")]
    pub ttl_millis: u64,
}

/// `GET /cache/` -> the local non-expired key/value view.
pub async fn get_all_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::Value::Object(state.coordinator.get_all()))
}

/// `GET /cache/{key}` -> 200 with the value, or 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.coordinator.get(&key).await? {
        Some(value) => Ok((StatusCode::OK, Json(value)).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

/// `POST /cache/{key}` -> 201 on success.
pub async fn put_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<PutRequest>,
) -> Result<StatusCode, ApiError> {
    state.coordinator.put(&key, body.value, body.ttl_millis).await?;
    Ok(StatusCode::CREATED)
}

/// `DELETE /cache/{key}` -> 204 on success.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.coordinator.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
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
    async fn put_then_get_round_trips() {
        let state = test_state();
        let status = put_handler(
            State(state.clone()),
            Path("k1".to_string()),
            Json(PutRequest { value: json!("v1"), ttl_millis: 0 }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let response = get_handler(State(state), Path("k1".to_string())).await.unwrap();
        assert_eq!(response.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_missing_key_returns_404() {
        let state = test_state();
        let response = get_handler(State(state), Path("missing".to_string())).await.unwrap();
        assert_eq!(response.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_returns_204() {
        let state = test_state();
        let status = delete_handler(State(state), Path("missing".to_string())).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
