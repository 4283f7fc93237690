//! Axum router construction for the relay.
//!
//! Assembles the status route and both `WebSocket` endpoints into a
//! single [`Router`] with CORS enabled for browser consumers.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the relay.
///
/// The router includes:
/// - `GET /` -- JSON connection counts and uptime
/// - `GET /broadcast` -- producer `WebSocket`
/// - `GET /receive` -- consumer `WebSocket`
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::status))
        .route("/broadcast", get(ws::producer_ws))
        .route("/receive", get(ws::consumer_ws))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
