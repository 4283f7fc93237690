//! Relay subscription.
//!
//! One long-lived task connects to the relay's consumer endpoint, feeds
//! every frame to the [`PlaybackScheduler`], and reconnects after a
//! short randomized delay whenever the connection drops.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use trailcast_playback::{IngestOutcome, PlaybackScheduler};
use trailcast_types::ConsumerMessage;

/// Fixed part of the reconnect delay.
const RECONNECT_BASE: Duration = Duration::from_secs(1);

/// Upper bound on the random part of the reconnect delay, in ms.
const RECONNECT_JITTER_MS: u64 = 500;

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// The relay closed or the socket failed.
    Disconnected,
    /// Shutdown was requested.
    Shutdown,
}

/// Subscribe to `url` until `shutdown` flips to `true`.
pub async fn run(url: String, scheduler: Arc<PlaybackScheduler>, mut shutdown: watch::Receiver<bool>) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                info!(url = %url, "Connected to relay");
                if read_frames(stream, &scheduler, &mut shutdown).await == SessionEnd::Shutdown {
                    break;
                }
                info!("Relay connection closed");
            }
            Err(e) => warn!(url = %url, "Relay connection failed: {e}"),
        }

        let delay = reconnect_delay();
        debug!(delay_ms = delay.as_millis(), "Reconnecting after delay");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {}
        }
        if *shutdown.borrow() {
            break;
        }
    }
    info!("Relay subscription stopped");
}

/// Pump frames from one connection into the scheduler.
async fn read_frames<S>(
    mut stream: S,
    scheduler: &PlaybackScheduler,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => dispatch(scheduler, text.as_str()).await,
                Some(Ok(Message::Binary(bytes))) => match core::str::from_utf8(&bytes) {
                    Ok(text) => dispatch(scheduler, text).await,
                    Err(e) => warn!("Dropping non-UTF-8 binary frame: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Disconnected,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Relay socket error: {e}");
                    return SessionEnd::Disconnected;
                }
            },
            _ = shutdown.changed() => return SessionEnd::Shutdown,
        }
    }
}

/// Decode one frame and hand it to the scheduler. Malformed frames are
/// logged and skipped.
async fn dispatch(scheduler: &PlaybackScheduler, text: &str) {
    let message = match ConsumerMessage::decode(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping malformed relay frame: {e}");
            return;
        }
    };
    match scheduler.handle(message).await {
        Some(IngestOutcome::Dropped(key)) => debug!(agent = %key, "Update dropped, queue full"),
        Some(IngestOutcome::Invalid(reason)) => debug!(%reason, "Update ignored"),
        Some(
            IngestOutcome::Created(_) | IngestOutcome::Appended { .. } | IngestOutcome::Filtered(_),
        )
        | None => {}
    }
}

fn reconnect_delay() -> Duration {
    let jitter = rand::rng().random_range(0..=RECONNECT_JITTER_MS);
    RECONNECT_BASE.saturating_add(Duration::from_millis(jitter))
}
