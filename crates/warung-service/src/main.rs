//! Warung Service - HTTP API for the warung point-of-sale backend
//!
//! This is the main entry point for the warung service.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warung_service::audio::spawn_audio_cleanup;
use warung_service::{create_router, AppState, ServiceConfig};
use warung_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warung=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Warung Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        audio_dir = %config.audio_dir,
        kolosal_configured = %config.kolosal_api_key.is_some(),
        speech_configured = %config.openai_api_key.is_some(),
        auto_commentary = %config.auto_commentary,
        "Service configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);

    // Sweep stale commentary clips in the background
    let _cleanup = spawn_audio_cleanup(
        config.audio_dir.clone().into(),
        Duration::from_secs(config.audio_max_age_minutes * 60),
        Duration::from_secs(config.audio_cleanup_interval_minutes * 60),
    );

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
