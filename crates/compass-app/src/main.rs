//! Compass application binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI overrides
//! 2. Open the chat history database
//! 3. Build the geocoding, routing, chat, and export clients
//! 4. Start the axum REST API server; each session gets a fresh assistant

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use compass_api::routes;
use compass_api::state::AppState;
use compass_chat::HttpChatBackend;
use compass_core::config::CompassConfig;
use compass_geo::{NominatimGeocoder, OsrmRouter};
use compass_map::TravelAssistant;
use compass_storage::{exporter_from_config, Database, HistoryRepository};

use crate::cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.config_path();
    let mut config = CompassConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Compass v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("compass.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // External collaborators.
    let geocoder = Arc::new(NominatimGeocoder::new(&config.geocoding)?);
    let router = Arc::new(OsrmRouter::new(&config.routing)?);
    let backend = Arc::new(HttpChatBackend::new(&config.chat)?);
    let exporter = exporter_from_config(&config.export)?;
    tracing::info!(
        geocoding = %config.geocoding.base_url,
        routing = %config.routing.base_url,
        chat = %config.chat.endpoint,
        "Service clients ready"
    );

    let factory = {
        let config = config.clone();
        move || {
            TravelAssistant::new(
                &config,
                geocoder.clone(),
                router.clone(),
                backend.clone(),
                exporter.clone(),
            )
            .with_store(HistoryRepository::new(db.clone()))
        }
    };

    // API server.
    let state = AppState::new(config.clone(), factory);
    if let Err(e) = routes::start_server(&config, state).await {
        tracing::error!(error = %e, "API server stopped");
        tracing::error!("Try: COMPASS_PORT={} compass", config.general.port.saturating_add(2));
        return Err(e.into());
    }

    Ok(())
}
