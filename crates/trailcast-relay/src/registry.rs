//! Connection registry tracking live producers and consumers.
//!
//! Every accepted WebSocket is registered under a fresh
//! [`ConnectionId`] with its [`Role`]. Consumer entries own the sending
//! half of a bounded outbound queue; a dedicated writer task per
//! consumer drains the other half onto the socket.
//!
//! Fan-out never awaits while holding the registry lock: each consumer
//! is offered the frame with `try_send`. A full queue drops the frame
//! for that consumer only. A closed queue means the writer task is gone,
//! so the consumer is deregistered after the read lock is released.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use trailcast_types::{ConnectionId, Role, StatsSnapshot};

/// A registered connection.
#[derive(Debug)]
pub struct Connection {
    /// Producer or consumer.
    pub role: Role,
    /// When the connection was registered.
    pub connected_at: Instant,
    /// Outbound queue feeding the consumer's writer task (consumers only).
    outbound: Option<mpsc::Sender<Utf8Bytes>>,
    /// Frames dropped because the outbound queue was full.
    dropped: AtomicU64,
}

impl Connection {
    fn producer() -> Self {
        Self {
            role: Role::Producer,
            connected_at: Instant::now(),
            outbound: None,
            dropped: AtomicU64::new(0),
        }
    }

    fn consumer(outbound: mpsc::Sender<Utf8Bytes>) -> Self {
        Self {
            role: Role::Consumer,
            connected_at: Instant::now(),
            outbound: Some(outbound),
            dropped: AtomicU64::new(0),
        }
    }

    /// Number of frames dropped for this connection under backpressure.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Outcome of offering one frame to every consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Consumers whose queue accepted the frame.
    pub delivered: usize,
    /// Consumers whose queue was full; the frame was dropped for them.
    pub dropped: usize,
    /// Consumers whose queue was closed; they have been deregistered.
    pub disconnected: usize,
}

/// Registry of every live relay connection.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<BTreeMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a producer connection.
    pub async fn register_producer(&self) -> ConnectionId {
        let id = ConnectionId::new();
        let mut connections = self.connections.write().await;
        connections.insert(id, Connection::producer());
        info!(connection = %id, total = connections.len(), "Producer registered");
        id
    }

    /// Register a consumer connection with an outbound queue of
    /// `capacity` frames (at least one). Returns the receiving half for
    /// its writer task.
    pub async fn register_consumer(
        &self,
        capacity: usize,
    ) -> (ConnectionId, mpsc::Receiver<Utf8Bytes>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mut connections = self.connections.write().await;
        connections.insert(id, Connection::consumer(tx));
        info!(connection = %id, total = connections.len(), "Consumer registered");
        (id, rx)
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub async fn deregister(&self, id: ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(&id);
        match removed {
            Some(connection) => {
                info!(
                    connection = %id,
                    role = %connection.role,
                    dropped = connection.dropped(),
                    connected_secs = connection.connected_at.elapsed().as_secs(),
                    "Connection deregistered"
                );
                true
            }
            None => false,
        }
    }

    /// Current producer and consumer counts.
    pub async fn counts(&self) -> StatsSnapshot {
        let connections = self.connections.read().await;
        let mut stats = StatsSnapshot::default();
        for connection in connections.values() {
            match connection.role {
                Role::Producer => stats.producers = stats.producers.saturating_add(1),
                Role::Consumer => stats.consumers = stats.consumers.saturating_add(1),
            }
        }
        stats
    }

    /// Whether a connection is still registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Offer `frame` to every consumer's outbound queue.
    ///
    /// One slow or broken consumer never delays the others: full queues
    /// drop the frame, closed queues are deregistered.
    pub async fn fan_out(&self, frame: &Utf8Bytes) -> FanOutReport {
        let mut report = FanOutReport::default();
        let mut closed = Vec::new();

        {
            let connections = self.connections.read().await;
            for (id, connection) in connections.iter() {
                let Some(outbound) = &connection.outbound else {
                    continue;
                };
                match outbound.try_send(frame.clone()) {
                    Ok(()) => report.delivered = report.delivered.saturating_add(1),
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        let dropped = connection.dropped.fetch_add(1, Ordering::Relaxed);
                        report.dropped = report.dropped.saturating_add(1);
                        debug!(
                            connection = %id,
                            dropped = dropped.saturating_add(1),
                            "Consumer queue full, frame dropped"
                        );
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        for id in closed {
            if self.deregister(id).await {
                report.disconnected = report.disconnected.saturating_add(1);
                warn!(connection = %id, "Consumer send failed, deregistered");
            }
        }

        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_by_role() {
        let registry = ConnectionRegistry::new();
        registry.register_producer().await;
        registry.register_producer().await;
        let (_id, _rx) = registry.register_consumer(4).await;

        let stats = registry.counts().await;
        assert_eq!(stats.producers, 2);
        assert_eq!(stats.consumers, 1);
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = registry.register_producer().await;

        assert!(registry.deregister(id).await);
        assert!(!registry.deregister(id).await);
        assert_eq!(registry.counts().await.producers, 0);
    }

    #[tokio::test]
    async fn fan_out_reaches_every_consumer() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = registry.register_consumer(4).await;
        let (_b, mut rx_b) = registry.register_consumer(4).await;
        registry.register_producer().await;

        let report = registry.fan_out(&Utf8Bytes::from_static("hello")).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(rx_a.recv().await.unwrap().as_str(), "hello");
        assert_eq!(rx_b.recv().await.unwrap().as_str(), "hello");
    }

    #[tokio::test]
    async fn closed_consumer_is_deregistered_without_affecting_others() {
        let registry = ConnectionRegistry::new();
        let (broken, rx_broken) = registry.register_consumer(4).await;
        let (_ok, mut rx_ok) = registry.register_consumer(4).await;
        drop(rx_broken);

        let report = registry.fan_out(&Utf8Bytes::from_static("frame")).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.disconnected, 1);
        assert!(!registry.contains(broken).await);
        assert_eq!(rx_ok.recv().await.unwrap().as_str(), "frame");
        assert_eq!(registry.counts().await.consumers, 1);
    }

    #[tokio::test]
    async fn full_queue_drops_newest_for_that_consumer_only() {
        let registry = ConnectionRegistry::new();
        let (slow, mut rx_slow) = registry.register_consumer(1).await;
        let (_fast, mut rx_fast) = registry.register_consumer(8).await;

        registry.fan_out(&Utf8Bytes::from_static("first")).await;
        let report = registry.fan_out(&Utf8Bytes::from_static("second")).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert!(registry.contains(slow).await);

        assert_eq!(rx_slow.recv().await.unwrap().as_str(), "first");
        assert!(rx_slow.try_recv().is_err());
        assert_eq!(rx_fast.recv().await.unwrap().as_str(), "first");
        assert_eq!(rx_fast.recv().await.unwrap().as_str(), "second");
    }
}
