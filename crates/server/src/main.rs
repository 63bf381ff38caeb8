//! chordium server entry point.
//!
//! Serves the artist song cache over HTTP. Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::{Context, Result};
use chordium_client::{FetchClient, FetchConfig, LazyObjectStore, LinkHarvestSource};
use chordium_core::AppConfig;
use tracing_subscriber::EnvFilter;

mod error;
mod gateway;
mod handlers;
mod routes;
mod state;

use gateway::{ArtistSongCacheGateway, GatewayConfig};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let fetch = FetchClient::new(FetchConfig::from(&config)).context("failed to build HTTP client")?;
    let source = Arc::new(LinkHarvestSource::new(fetch));
    let store = Arc::new(LazyObjectStore::from_config(config.object_store.clone()));
    let gateway = ArtistSongCacheGateway::new(
        store,
        source,
        GatewayConfig { base_url: config.source_base_url.clone(), single_flight: config.single_flight },
    );

    let app = routes::create_router(AppState::new(gateway));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, source = %config.source_base_url, "starting chordium server");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("chordium server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
