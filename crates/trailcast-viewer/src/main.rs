//! Headless viewer for Trailcast.
//!
//! Subscribes to the relay's consumer endpoint and runs the playback
//! engine at a fixed frame rate, logging frames through the tracing sink.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration (YAML file, environment, then flags)
//! 3. Load map data and build the agent store
//! 4. Spawn the relay subscription, the frame loop, and the stdin console
//! 5. Run until `Ctrl-C`, then stop all three

mod config;
mod console;
mod error;
mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use trailcast_playback::{
    AgentStore, FlatResolver, FrameClock, MapResolver, MapTable, PlaybackScheduler, TickReport,
    TracingSink,
};

use crate::config::ViewerConfig;
use crate::error::ViewerError;

/// Default configuration file, looked up in the working directory.
const DEFAULT_CONFIG_PATH: &str = "trailcast-viewer.yaml";

/// Frames between periodic status lines.
const STATUS_EVERY_FRAMES: u64 = 600;

/// Command-line flags.
#[derive(Debug, Parser)]
#[command(name = "trailcast-viewer", version, about = "Position playback viewer")]
struct Args {
    /// Relay consumer endpoint (e.g. `ws://127.0.0.1:8080/receive`).
    #[arg(long)]
    relay_url: Option<String>,

    /// Identity filter regex over `user@stack`.
    #[arg(long)]
    filter: Option<String>,

    /// Path to an optional YAML configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

/// Application entry point for the viewer.
///
/// # Errors
///
/// Returns an error if configuration, map data, or the identity filter
/// is invalid.
#[tokio::main]
async fn main() -> Result<(), ViewerError> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("trailcast-viewer starting");

    // 2. Load configuration.
    let args = Args::parse();
    let mut config = load_config(&args.config)?;
    if let Some(url) = args.relay_url {
        config.relay_url = url;
    }
    if let Some(filter) = args.filter {
        config.playback.user_filter = Some(filter);
    }
    config.validate()?;
    info!(
        relay_url = config.relay_url,
        fps = config.fps,
        stacking_enabled = config.playback.stacking_enabled,
        user_filter = config.playback.user_filter.as_deref().unwrap_or(""),
        "Configuration loaded"
    );

    // 3. Map data and the agent store.
    let resolver: Arc<dyn MapResolver + Send + Sync> = match &config.map_data {
        Some(path) => {
            let table = MapTable::load(path)?;
            info!(path = %path.display(), maps = table.len(), "Map data loaded");
            Arc::new(table)
        }
        None => {
            info!("No map data configured, using flat coordinates");
            Arc::new(FlatResolver)
        }
    };
    let store = AgentStore::new(config.playback.clone())?;
    let scheduler = Arc::new(PlaybackScheduler::new(store, resolver));

    // 4. Spawn the subscription, the frame loop, and the console.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let clock = FrameClock::new();
    let reader = tokio::spawn(session::run(
        config.relay_url.clone(),
        Arc::clone(&scheduler),
        shutdown_rx.clone(),
    ));
    let frames = tokio::spawn(run_frames(
        Arc::clone(&scheduler),
        clock,
        config.frame_interval(),
        shutdown_rx.clone(),
    ));
    let console = tokio::spawn(console::run(
        tokio::io::BufReader::new(tokio::io::stdin()),
        Arc::clone(&scheduler),
        clock,
        shutdown_rx,
    ));

    // 5. Wait for Ctrl-C.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown_tx.send_replace(true);
    for (name, task) in [("reader", reader), ("frames", frames), ("console", console)] {
        if let Err(e) = task.await {
            warn!(task = name, "Task ended abnormally: {e}");
        }
    }

    info!("trailcast-viewer shutdown complete");
    Ok(())
}

/// Drive the scheduler once per frame until shutdown.
async fn run_frames(
    scheduler: Arc<PlaybackScheduler>,
    mut clock: FrameClock,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut sink = TracingSink::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let report = scheduler.tick(clock.now_ms(), &mut sink);
        let frame = match clock.advance() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Stopping frame loop: {e}");
                break;
            }
        };
        match report {
            TickReport::Skipped => debug!(frame, "Frame skipped, store busy"),
            TickReport::Ran { agents, .. } if frame.checked_rem(STATUS_EVERY_FRAMES) == Some(0) => {
                let stats = scheduler.latest_stats();
                info!(
                    frame,
                    agents,
                    envs = stats.producers,
                    viewers = stats.consumers,
                    draws = sink.draws(),
                    "Playback status"
                );
            }
            TickReport::Ran { .. } => {}
        }
    }
    info!("Frame loop stopped");
}

/// Load configuration from `path`, falling back to defaults (plus
/// environment overrides) when the file does not exist.
fn load_config(path: &Path) -> Result<ViewerConfig, ViewerError> {
    if path.exists() {
        Ok(ViewerConfig::from_file(path)?)
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        let mut config = ViewerConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}
