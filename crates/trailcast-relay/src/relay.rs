//! Producer ingest, verbatim fan-out, and the periodic stats push.
//!
//! The relay never rewrites an update: once a producer frame parses and
//! passes [`UpdateMessage::validate`], the original text is what every
//! consumer receives. Frames from one producer are handled in receipt
//! order by that producer's connection task; there is no ordering
//! across producers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use trailcast_types::{CodecError, ConnectionId, StatsEnvelope, UpdateMessage, ValidationError};

use crate::registry::{ConnectionRegistry, FanOutReport};

/// Shortest period the stats task will tick at.
const MIN_STATS_INTERVAL: Duration = Duration::from_millis(1);

/// What happened to one producer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The frame was offered to every consumer.
    Forwarded(FanOutReport),
    /// The frame was not valid JSON for an update; logged and dropped.
    Malformed,
    /// The frame parsed but failed shape validation; dropped silently.
    Rejected(ValidationError),
}

/// The relay core: validates producer frames and fans them out.
#[derive(Debug, Clone)]
pub struct Relay {
    registry: Arc<ConnectionRegistry>,
}

impl Relay {
    /// Create a relay over the given registry.
    pub const fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this relay forwards through.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Handle a text frame from a producer.
    pub async fn on_producer_text(&self, from: ConnectionId, text: Utf8Bytes) -> RelayOutcome {
        match UpdateMessage::decode(text.as_str()) {
            Ok(update) => self.forward(from, &update, text).await,
            Err(e) => Self::malformed(from, &e),
        }
    }

    /// Handle a binary frame from a producer. The payload must be UTF-8
    /// JSON; it is forwarded to consumers as a text frame.
    pub async fn on_producer_binary(&self, from: ConnectionId, bytes: &[u8]) -> RelayOutcome {
        match UpdateMessage::decode_bytes(bytes) {
            Ok(update) => {
                // Already checked as UTF-8 by the decode; the conversion is exact.
                let text = String::from_utf8_lossy(bytes).into_owned();
                self.forward(from, &update, Utf8Bytes::from(text)).await
            }
            Err(e) => Self::malformed(from, &e),
        }
    }

    /// Remove a disconnected producer or consumer. Safe to call twice.
    pub async fn on_disconnect(&self, id: ConnectionId) {
        self.registry.deregister(id).await;
    }

    /// Build a stats envelope from the registry and push it to every
    /// consumer under the same isolation rules as updates.
    pub async fn broadcast_stats(&self) -> Option<FanOutReport> {
        let stats = self.registry.counts().await;
        let json = match StatsEnvelope::new(stats).encode() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize stats envelope: {e}");
                return None;
            }
        };
        let report = self.registry.fan_out(&Utf8Bytes::from(json)).await;
        debug!(
            envs = stats.producers,
            viewers = stats.consumers,
            delivered = report.delivered,
            "Stats broadcast sent"
        );
        Some(report)
    }

    /// Spawn the background stats task, firing every `interval` (at
    /// least one millisecond).
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_stats_task(&self, interval: Duration) -> JoinHandle<()> {
        let relay = self.clone();
        let interval = interval.max(MIN_STATS_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                relay.broadcast_stats().await;
            }
        })
    }

    async fn forward(
        &self,
        from: ConnectionId,
        update: &UpdateMessage,
        original: Utf8Bytes,
    ) -> RelayOutcome {
        if let Err(reason) = update.validate() {
            debug!(connection = %from, %reason, "Update rejected");
            return RelayOutcome::Rejected(reason);
        }
        let report = self.registry.fan_out(&original).await;
        debug!(
            connection = %from,
            user = %update.metadata.user,
            points = update.coords.len(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Update forwarded"
        );
        RelayOutcome::Forwarded(report)
    }

    fn malformed(from: ConnectionId, error: &CodecError) -> RelayOutcome {
        warn!(connection = %from, "Dropping malformed producer frame: {error}");
        RelayOutcome::Malformed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn relay() -> Relay {
        Relay::new(Arc::new(ConnectionRegistry::new()))
    }

    #[tokio::test]
    async fn valid_update_is_forwarded_verbatim() {
        let relay = relay();
        let producer = relay.registry().register_producer().await;
        let (_c, mut rx) = relay.registry().register_consumer(8).await;

        let text = r#"{"metadata":{"user":"alice"},"coords":[[1,1,0],[2,1,0],[3,1,0]]}"#;
        let outcome = relay
            .on_producer_text(producer, Utf8Bytes::from_static(text))
            .await;

        assert!(matches!(outcome, RelayOutcome::Forwarded(r) if r.delivered == 1));
        assert_eq!(rx.recv().await.unwrap().as_str(), text);
    }

    #[tokio::test]
    async fn malformed_json_is_dropped_and_producer_stays_registered() {
        let relay = relay();
        let producer = relay.registry().register_producer().await;
        let (_c, mut rx) = relay.registry().register_consumer(8).await;

        let outcome = relay
            .on_producer_text(producer, Utf8Bytes::from_static("{not json"))
            .await;

        assert_eq!(outcome, RelayOutcome::Malformed);
        assert!(relay.registry().contains(producer).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_user_is_never_forwarded() {
        let relay = relay();
        let producer = relay.registry().register_producer().await;
        let (_c, mut rx) = relay.registry().register_consumer(8).await;

        let outcome = relay
            .on_producer_text(
                producer,
                Utf8Bytes::from_static(r#"{"metadata":{"user":""},"coords":[[1,1,0]]}"#),
            )
            .await;

        assert_eq!(outcome, RelayOutcome::Rejected(ValidationError::EmptyUser));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_path_is_never_forwarded() {
        let relay = relay();
        let producer = relay.registry().register_producer().await;

        let outcome = relay
            .on_producer_text(producer, Utf8Bytes::from_static(r#"{"metadata":{"user":"a"}}"#))
            .await;

        assert_eq!(outcome, RelayOutcome::Rejected(ValidationError::EmptyPath));
    }

    #[tokio::test]
    async fn binary_frames_are_forwarded_as_text() {
        let relay = relay();
        let producer = relay.registry().register_producer().await;
        let (_c, mut rx) = relay.registry().register_consumer(8).await;

        let text = r#"{"metadata":{"user":"bin"},"coords":[[0,0,1]]}"#;
        let outcome = relay.on_producer_binary(producer, text.as_bytes()).await;

        assert!(matches!(outcome, RelayOutcome::Forwarded(_)));
        assert_eq!(rx.recv().await.unwrap().as_str(), text);

        let outcome = relay.on_producer_binary(producer, &[0xc3, 0x28]).await;
        assert_eq!(outcome, RelayOutcome::Malformed);
    }

    #[tokio::test]
    async fn stats_reach_every_consumer() {
        let relay = relay();
        for _ in 0..3 {
            relay.registry().register_producer().await;
        }
        let mut receivers = Vec::new();
        for _ in 0..5 {
            let (_id, rx) = relay.registry().register_consumer(8).await;
            receivers.push(rx);
        }

        let report = relay.broadcast_stats().await.unwrap();
        assert_eq!(report.delivered, 5);
        for rx in &mut receivers {
            assert_eq!(
                rx.recv().await.unwrap().as_str(),
                r#"{"stats":{"envs":3,"viewers":5}}"#
            );
        }
    }

    #[tokio::test]
    async fn zero_interval_stats_task_still_ticks() {
        let relay = relay();
        let (_c, mut rx) = relay.registry().register_consumer(8).await;
        let task = relay.spawn_stats_task(Duration::ZERO);

        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(frame.as_str().starts_with(r#"{"stats""#));
        assert!(!task.is_finished());
        task.abort();
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let relay = relay();
        let id = relay.registry().register_producer().await;
        relay.on_disconnect(id).await;
        relay.on_disconnect(id).await;
        assert_eq!(relay.registry().counts().await.producers, 0);
    }
}
