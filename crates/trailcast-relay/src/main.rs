//! Relay binary for Trailcast.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration (YAML file, environment, then flags)
//! 3. Bind the listener and spawn the server and stats task
//! 4. Run until `Ctrl-C`, then shut down gracefully

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trailcast_relay::{ConfigError, RelayConfig, spawn_relay};

/// Default configuration file, looked up in the working directory.
const DEFAULT_CONFIG_PATH: &str = "trailcast-relay.yaml";

/// Command-line flags. Only the listen address is exposed.
#[derive(Debug, Parser)]
#[command(name = "trailcast-relay", version, about = "Position update relay")]
struct Args {
    /// Host address to bind to.
    #[arg(long)]
    host: Option<String>,

    /// TCP port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Path to an optional YAML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

/// Application entry point for the relay.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the listener cannot
/// bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("trailcast-relay starting");

    // 2. Load configuration.
    let args = Args::parse();
    let mut config = load_config(&args.config)?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;
    info!(
        host = config.host,
        port = config.port,
        stats_interval_ms = config.stats_interval_ms,
        outbound_queue_capacity = config.outbound_queue_capacity,
        "Configuration loaded"
    );

    // 3. Start serving.
    let handle = spawn_relay(&config).await?;
    info!(addr = %handle.addr(), "Relay ready");

    // 4. Wait for Ctrl-C.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    handle.shutdown().await;

    info!("trailcast-relay shutdown complete");
    Ok(())
}

/// Load configuration from `path`, falling back to defaults (plus
/// environment overrides) when the file does not exist.
fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    if path.exists() {
        RelayConfig::from_file(path)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        let mut config = RelayConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}
