use std::sync::Arc;

use clap::Parser;
use ringcache_core::HashRing;
use ringcache_server::network::NetworkConfig;
use ringcache_server::{Coordinator, LocalStore, Membership, NetworkModule, PeerClient, ServerConfig, ServiceRegistry};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Arc::new(ServerConfig::parse());
    let node = config.node();
    tracing::info!(node = %node, "starting");

    let ring = Arc::new(HashRing::new(config.replication_factor));
    let peer_client = Arc::new(PeerClient::new(
        config.connect_timeout_ms,
        config.read_timeout_ms,
        config.heartbeat_timeout_ms,
    ));

    let registry = ServiceRegistry::new();

    registry.register(LocalStore::new(config.effective_max_entries()));
    let store = registry.get::<LocalStore>().expect("just registered");

    let coordinator = Arc::new(Coordinator::new(
        node.clone(),
        Arc::clone(&ring),
        Arc::clone(&store),
        Arc::clone(&peer_client),
    ));

    registry.register(Membership::new(node.clone(), &config.peers, Arc::clone(&ring), Arc::clone(&peer_client)));
    let membership = registry.get::<Membership>().expect("just registered");

    // Ring receives the local node (inside Membership::init) before either
    // background task starts.
    registry.init_all().await?;
    store.start_sweeper();
    membership.start_tasks();

    let network_config = NetworkConfig {
        host: config.node_host.clone(),
        port: config.node_port,
        ..NetworkConfig::default()
    };
    let mut network = NetworkModule::new(network_config, coordinator, membership, Arc::clone(&config));
    let port = network.start().await?;
    tracing::info!(port, "listening");

    network.serve(shutdown_signal()).await?;

    registry.shutdown_all().await?;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Resolves once on Ctrl-C or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
