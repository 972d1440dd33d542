//! Server runtime: HTTP matchmaking API plus the WebSocket relay.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::MatchConfig;
use crate::matchmaking::Matchmaker;
use crate::registry::SessionRegistry;

use super::api::{self, ApiState};
use super::relay;

/// Where to listen and how to match.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub relay_addr: SocketAddr,
    pub matching: MatchConfig,
}

/// Run the matchmaking server until Ctrl-C.
pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.matching.validate()?;

    let registry = Arc::new(SessionRegistry::new(config.matching.lock_timeout));
    let matchmaker = Arc::new(Matchmaker::new(
        config.matching.clone(),
        Arc::clone(&registry),
    ));

    let relay_listener = TcpListener::bind(config.relay_addr).await?;
    tracing::info!(addr = %relay_listener.local_addr()?, "relay listening");

    let http_listener = TcpListener::bind(config.http_addr).await?;
    tracing::info!(addr = %http_listener.local_addr()?, "matchmaking API listening");

    tracing::info!(
        queue_capacity = config.matching.queue_capacity,
        max_pending_pairs = config.matching.max_pending_pairs,
        tick = ?config.matching.tick,
        recency_window_ticks = config.matching.recency_window_ticks,
        claim_window_ticks = config.matching.claim_window_ticks,
        "matchmaker ready"
    );

    let relay_task = tokio::spawn(relay::serve(relay_listener, Arc::clone(&registry)));

    let app = api::router(ApiState { matchmaker });
    axum::serve(http_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    relay_task.abort();
    if let Err(e) = registry.shutdown().await {
        tracing::warn!(error = %e, "failed to close relay connections");
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
