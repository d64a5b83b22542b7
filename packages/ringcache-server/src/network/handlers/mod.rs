//! Handler definitions and the shared application state passed to every
//! axum extractor.

pub mod admin;
pub mod cache;
pub mod health;
pub mod internal;

pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use ringcache_core::CacheError;
use serde_json::json;

use crate::config::ServerConfig;
use crate::coordinator::Coordinator;
use crate::membership::Membership;

use super::shutdown::ShutdownController;

/// Shared state carried through every axum extractor.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub membership: Arc<Membership>,
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<ServerConfig>,
    pub start_time: Instant,
}

/// Wraps `CacheError` so it can be returned directly from a handler.
///
/// Converts to a status code plus a small `{"error": "..."}` body; handlers
/// themselves never reference a status-code literal for the failure path.
pub struct ApiError(pub CacheError);

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            CacheError::RingEmpty => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::PeerUnreachable { .. } | CacheError::PeerTimeout { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            CacheError::PeerErrorResponse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::MisconfiguredCapacity => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::MalformedPeerAddress { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(error = %self.0, "request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
