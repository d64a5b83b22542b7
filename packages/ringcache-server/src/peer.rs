//! Outbound calls to another node's internal endpoint.
//!
//! One `PeerClient` is shared across the whole process: a single
//! `reqwest::Client` reuses connections, and separate client instances
//! carry the data-call and heartbeat-call timeout budgets so a slow
//! heartbeat can't borrow the longer data-call timeout.

use std::time::Duration;

use ringcache_core::{CacheError, CacheValue, Node};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct PutBody {
    value: CacheValue,
    #[serde(rename = "ttlMillis")]
    ttl_millis: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatBody {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    #[serde(rename = "nodeHost")]
    pub node_host: String,
    #[serde(rename = "nodePort")]
    pub node_port: u16,
    pub timestamp: u64,
}

pub struct PeerClient {
    data: reqwest::Client,
    heartbeat: reqwest::Client,
}

impl PeerClient {
    /// # Panics
    /// Panics if the underlying `reqwest` clients fail to build, which only
    /// happens for invalid TLS configuration -- not applicable here.
    #[must_use]
    pub fn new(connect_timeout_ms: u64, read_timeout_ms: u64, heartbeat_timeout_ms: u64) -> Self {
        let data = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(connect_timeout_ms))
            .timeout(Duration::from_millis(read_timeout_ms))
            .build()
            .expect("building the data-call HTTP client cannot fail with this configuration");

        let heartbeat = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(connect_timeout_ms))
            .timeout(Duration::from_millis(heartbeat_timeout_ms))
            .build()
            .expect("building the heartbeat HTTP client cannot fail with this configuration");

        Self { data, heartbeat }
    }

    /// `200 -> value`, `404 -> None`, anything else is an error.
    pub async fn forward_get(&self, node: &Node, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let url = internal_cache_url(node, key);
        let response = self
            .data
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_error(node, e))?;

        match response.status() {
            reqwest::StatusCode::OK => {
                let value = response
                    .json::<CacheValue>()
                    .await
                    .map_err(|e| classify_error(node, e))?;
                Ok(Some(value))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => Err(error_body(node, &response_body_status(status), response).await),
        }
    }

    /// `200 -> ok`, anything else carries the remote body in the error.
    pub async fn forward_put(
        &self,
        node: &Node,
        key: &str,
        value: CacheValue,
        ttl_ms: u64,
    ) -> Result<(), CacheError> {
        let url = internal_cache_url(node, key);
        let body = PutBody { value, ttl_millis: ttl_ms };
        let response = self
            .data
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_error(node, e))?;

        if response.status() == reqwest::StatusCode::OK {
            Ok(())
        } else {
            let status = response.status();
            Err(error_body(node, &status.to_string(), response).await)
        }
    }

    /// `204 -> ok`, anything else is an error.
    pub async fn forward_delete(&self, node: &Node, key: &str) -> Result<(), CacheError> {
        let url = internal_cache_url(node, key);
        let response = self
            .data
            .delete(&url)
            .send()
            .await
            .map_err(|e| classify_error(node, e))?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            Ok(())
        } else {
            let status = response.status();
            Err(error_body(node, &status.to_string(), response).await)
        }
    }

    /// Any non-success is absorbed: logged and treated as a completed no-op.
    /// Heartbeat failure never propagates to a caller.
    pub async fn send_heartbeat(&self, node: &Node, body: &HeartbeatBody) {
        let url = format!("http://{}/internal/cache/heartbeat", node.address());
        match self.heartbeat.post(&url).json(body).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::warn!(peer = %node, status = %response.status(), "heartbeat rejected by peer");
            }
            Err(err) => {
                tracing::warn!(peer = %node, error = %err, "heartbeat send failed");
            }
        }
    }
}

fn internal_cache_url(node: &Node, key: &str) -> String {
    format!("http://{}/internal/cache/{}", node.address(), key)
}

fn classify_error(node: &Node, err: reqwest::Error) -> CacheError {
    if err.is_timeout() {
        CacheError::PeerTimeout { address: node.address() }
    } else {
        CacheError::PeerUnreachable {
            address: node.address(),
            source: anyhow::anyhow!(err),
        }
    }
}

fn response_body_status(status: reqwest::StatusCode) -> String {
    status.to_string()
}

async fn error_body(node: &Node, status_display: &str, response: reqwest::Response) -> CacheError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_else(|_| status_display.to_string());
    CacheError::PeerErrorResponse {
        address: node.address(),
        status,
        body,
    }
}
