//! Relay server for Trailcast.
//!
//! Producers stream agent position updates to `GET /broadcast`; the
//! relay validates each frame and forwards the original text to every
//! consumer connected on `GET /receive`. Every stats interval it pushes
//! `{"stats": {"envs": N, "viewers": M}}` to all consumers.
//!
//! # Architecture
//!
//! The [`ConnectionRegistry`] owns every live connection. Each consumer
//! has its own writer task fed by a bounded queue, so fan-out is a
//! non-blocking `try_send` per consumer: a slow consumer loses frames,
//! a broken one is deregistered, and neither delays anyone else.
//!
//! [`ConnectionRegistry`]: registry::ConnectionRegistry

pub mod config;
pub mod handlers;
pub mod registry;
pub mod relay;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use config::{ConfigError, RelayConfig};
pub use registry::{ConnectionRegistry, FanOutReport};
pub use relay::{Relay, RelayOutcome};
pub use router::build_router;
pub use server::{ServerError, serve, start_server};
pub use startup::{RelayHandle, StartupError, spawn_relay};
pub use state::AppState;
