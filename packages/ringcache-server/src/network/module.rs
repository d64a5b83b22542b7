//! HTTP server with deferred startup lifecycle.
//!
//! `new()` allocates shared state, `start()` binds the TCP listener, and
//! `serve()` begins accepting connections. The separation lets `main`
//! finish bringing up the coordinator and membership services, whose
//! addresses the admin/readiness endpoints depend on, before traffic flows.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{admin, cache, health, internal, AppState};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::config::ServerConfig;
use crate::coordinator::Coordinator;
use crate::membership::Membership;

pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    coordinator: Arc<Coordinator>,
    membership: Arc<Membership>,
    server_config: Arc<ServerConfig>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        coordinator: Arc<Coordinator>,
        membership: Arc<Membership>,
        server_config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            config,
            listener: None,
            coordinator,
            membership,
            server_config,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    fn state(&self) -> AppState {
        AppState {
            coordinator: Arc::clone(&self.coordinator),
            membership: Arc::clone(&self.membership),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::clone(&self.server_config),
            start_time: Instant::now(),
        }
    }

    /// Assembles the full router: `/cache` (public), `/internal/cache`
    /// (peer-to-peer), and `/admin` (operator), all behind the same
    /// middleware stack.
    #[must_use]
    pub fn build_router(&self) -> Router {
        let cache_routes = Router::new()
            .route("/", get(cache::get_all_handler))
            .route(
                "/{key}",
                get(cache::get_handler).post(cache::put_handler).delete(cache::delete_handler),
            );

        let internal_routes = Router::new()
            .route("/heartbeat", post(internal::heartbeat_handler))
            .route(
                "/{key}",
                get(internal::get_handler)
                    .post(internal::put_handler)
                    .delete(internal::delete_handler),
            );

        let admin_routes = Router::new()
            .route("/stats", get(admin::stats_handler))
            .route("/healthz", get(health::health_handler))
            .route("/healthz/live", get(health::liveness_handler))
            .route("/healthz/ready", get(health::readiness_handler));

        let layers = build_http_layers(&self.config);

        Router::new()
            .nest("/cache", cache_routes)
            .nest("/internal/cache", internal_routes)
            .nest("/admin", admin_routes)
            .layer(layers)
            .with_state(self.state())
    }

    /// Binds the TCP listener, returning the actual bound port (useful when
    /// the configured port is 0, for tests).
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!("TCP listener bound to {}:{}", self.config.host, port);
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests for
    /// up to 30 seconds before returning.
    ///
    /// # Errors
    /// Returns an error on a fatal I/O failure.
    ///
    /// # Panics
    /// Panics if `start()` was not called first.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let listener = self.listener.expect("start() must be called before serve()");
        let shutdown_ctrl = Arc::clone(&self.shutdown);
        let router = self.build_router();

        shutdown_ctrl.set_ready();

        info!("serving HTTP on {}", listener.local_addr()?);
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;

        shutdown_ctrl.trigger_shutdown();
        let drained = shutdown_ctrl.wait_for_drain(Duration::from_secs(30)).await;
        if drained {
            info!("all in-flight requests drained");
        } else {
            warn!("drain timeout expired with in-flight requests remaining");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::PeerClient;
    use crate::store::LocalStore;
    use ringcache_core::{HashRing, Node};

    fn test_module() -> NetworkModule {
        let node = Node::new("n1", "127.0.0.1", 0);
        let ring = Arc::new(HashRing::new(1));
        ring.add_physical(node.clone());
        let peer_client = Arc::new(PeerClient::new(1_000, 1_000, 1_000));
        let store = Arc::new(LocalStore::new(10));
        let coordinator = Arc::new(Coordinator::new(node.clone(), ring.clone(), store, peer_client.clone()));
        let membership = Arc::new(Membership::new(node, &[], ring, peer_client));
        let server_config = Arc::new(ServerConfig {
            node_id: "n1".to_string(),
            node_host: "127.0.0.1".to_string(),
            node_port: 0,
            peers: vec![],
            replication_factor: 1,
            max_entries: 10,
            connect_timeout_ms: 1_000,
            read_timeout_ms: 1_000,
            heartbeat_timeout_ms: 1_000,
        });

        NetworkModule::new(NetworkConfig::default(), coordinator, membership, server_config)
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = test_module();
        assert!(module.listener.is_none());
    }

    #[test]
    fn build_router_creates_router() {
        let module = test_module();
        let _router = module.build_router();
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = test_module();
        let port = module.start().await.expect("start should succeed");
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    #[should_panic(expected = "start() must be called before serve()")]
    async fn serve_panics_without_start() {
        let module = test_module();
        let _ = module.serve(std::future::pending::<()>()).await;
    }
}
