//! Shared application state for the relay server.
//!
//! [`AppState`] bundles the [`Relay`] (and through it the connection
//! registry) with the per-consumer queue size. It is wrapped in [`Arc`]
//! and injected into every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::config::RelayConfig;
use crate::registry::ConnectionRegistry;
use crate::relay::Relay;

/// Shared state for the Axum application.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The relay core.
    pub relay: Relay,
    /// Outbound frames buffered per consumer.
    pub outbound_queue_capacity: usize,
    /// When the relay started serving.
    pub started_at: Instant,
}

impl AppState {
    /// Create state with an empty registry.
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            relay: Relay::new(Arc::new(ConnectionRegistry::new())),
            outbound_queue_capacity: config.outbound_queue_capacity,
            started_at: Instant::now(),
        }
    }

    /// The connection registry behind the relay.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.relay.registry()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&RelayConfig::default())
    }
}
