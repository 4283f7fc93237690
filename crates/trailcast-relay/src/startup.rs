//! Relay startup helper.
//!
//! [`spawn_relay`] binds the listener eagerly (so callers learn the real
//! address, including an OS-assigned port), then runs the server and the
//! stats task on background Tokio tasks.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trailcast_relay::{RelayConfig, spawn_relay};
//!
//! let handle = spawn_relay(&RelayConfig::default()).await?;
//! println!("relay on {}", handle.addr());
//! handle.shutdown().await;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, RelayConfig};
use crate::server::{ServerError, serve};
use crate::state::AppState;

/// Errors that can occur when spawning the relay.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A running relay.
#[derive(Debug)]
pub struct RelayHandle {
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
    stats: JoinHandle<()>,
}

impl RelayHandle {
    /// The address the relay is listening on.
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The shared state behind the running relay.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Stop the stats task and shut the server down gracefully.
    pub async fn shutdown(mut self) {
        self.stats.abort();
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.server.await {
            tracing::warn!("Relay server task ended abnormally: {e}");
        }
    }
}

/// Bind the relay and start serving in the background.
///
/// # Errors
///
/// Returns [`StartupError::Config`] if the configuration is out of range
/// and [`StartupError::Server`] if the address is invalid or the listener
/// cannot bind.
pub async fn spawn_relay(config: &RelayConfig) -> Result<RelayHandle, StartupError> {
    config.validate()?;
    let addr = config
        .listen_addr()
        .map_err(|e| ServerError::Bind(e.to_string()))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let state = Arc::new(AppState::new(config));
    let stats = state.relay.spawn_stats_task(config.stats_interval());

    let (tx, rx) = oneshot::channel::<()>();
    let server_state = Arc::clone(&state);
    let server = tokio::spawn(async move {
        let shutdown = async move {
            let _ = rx.await;
        };
        if let Err(e) = serve(listener, server_state, shutdown).await {
            tracing::error!(error = %e, "Relay server exited with error");
        }
    });

    tracing::info!(%addr, stats_interval_ms = config.stats_interval_ms, "Relay spawned");

    Ok(RelayHandle {
        addr,
        state,
        shutdown: Some(tx),
        server,
        stats,
    })
}
