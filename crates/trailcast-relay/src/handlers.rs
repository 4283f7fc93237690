//! Plain HTTP handlers for the relay.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Body of `GET /`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusResponse {
    /// Registered producers.
    pub envs: u64,
    /// Registered consumers.
    pub viewers: u64,
    /// Seconds since the relay started.
    pub uptime_secs: u64,
}

/// Report live connection counts and uptime.
///
/// # Route
///
/// `GET /`
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let stats = state.registry().counts().await;
    Json(StatusResponse {
        envs: stats.producers,
        viewers: stats.consumers,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
