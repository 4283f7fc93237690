//! `WebSocket` handlers for producers and consumers.
//!
//! Producers connect to `GET /broadcast` and stream update frames in.
//! Consumers connect to `GET /receive`; each gets a writer task that
//! drains its bounded outbound queue onto the socket while the handler
//! watches the read half for close frames. Whichever side ends first
//! tears the connection down and deregisters it.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::state::AppState;

/// Upgrade an HTTP request to a producer `WebSocket`.
///
/// # Route
///
/// `GET /broadcast`
pub async fn producer_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_producer(socket, state))
}

/// Upgrade an HTTP request to a consumer `WebSocket`.
///
/// # Route
///
/// `GET /receive`
pub async fn consumer_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_consumer(socket, state))
}

/// Producer lifecycle: register, relay every frame in receipt order,
/// deregister on close or error.
async fn handle_producer(mut socket: WebSocket, state: Arc<AppState>) {
    let relay = &state.relay;
    let id = relay.registry().register_producer().await;

    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => {
                relay.on_producer_text(id, text).await;
            }
            Some(Ok(Message::Binary(bytes))) => {
                relay.on_producer_binary(id, &bytes).await;
            }
            Some(Ok(Message::Ping(data))) => {
                if socket.send(Message::Pong(data)).await.is_err() {
                    debug!(connection = %id, "Producer disconnected (pong failed)");
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!(connection = %id, "Producer disconnected");
                break;
            }
            Some(Ok(Message::Pong(_))) => {}
            Some(Err(e)) => {
                debug!(connection = %id, "Producer WebSocket error: {e}");
                break;
            }
        }
    }

    relay.on_disconnect(id).await;
}

/// Consumer lifecycle: register with an outbound queue, run the writer
/// task, and wait for either side to finish.
async fn handle_consumer(socket: WebSocket, state: Arc<AppState>) {
    let relay = &state.relay;
    let (id, rx) = relay
        .registry()
        .register_consumer(state.outbound_queue_capacity)
        .await;
    let (sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(writer_task(sink, rx));

    loop {
        tokio::select! {
            _ = &mut writer => {
                debug!(connection = %id, "Consumer disconnected (send failed)");
                break;
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(connection = %id, "Consumer disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(connection = %id, "Consumer WebSocket error: {e}");
                        break;
                    }
                    _ => {
                        // Consumers have nothing to say; pings are answered
                        // by the protocol layer.
                    }
                }
            }
        }
    }

    writer.abort();
    relay.on_disconnect(id).await;
}

/// Forward queued frames to the socket until the queue closes or a send
/// fails.
async fn writer_task(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<axum::extract::ws::Utf8Bytes>,
) {
    while let Some(frame) = rx.recv().await {
        if sink.send(Message::Text(frame)).await.is_err() {
            break;
        }
    }
}
