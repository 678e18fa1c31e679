mod api;
mod commands;
mod config;
mod error;
mod heartbeat;
mod platform;
mod purge;
mod state;
mod wish;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::heartbeat::Heartbeat;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wishes_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Channel: {}", config.discord.channel_id);
    info!("  Listen: {}", config.listen_address());
    info!(
        "  Purge: {}s confirmation, {}ms pacing",
        config.purge.confirm_timeout_secs, config.purge.pace_ms
    );

    let state = Arc::new(AppState::new(config));
    let _heartbeat = Heartbeat::start(&state.config.heartbeat.cron, state.clone()).await?;

    // A failed login ends the process; so does the HTTP server shutting down.
    tokio::select! {
        result = platform::discord::run(state.clone()) => result?,
        result = api::serve(state) => result?,
    }

    Ok(())
}
