//! Frame tick and ingest coordination.
//!
//! The network reader and the frame loop both touch the [`AgentStore`].
//! Ingest waits for the lock; a tick that finds it held is skipped, and
//! the next tick catches up since playback is driven by timestamps
//! rather than frame counts.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tracing::debug;
use trailcast_types::{ConsumerMessage, StatsSnapshot, UpdateMessage};

use crate::filter::FilterError;
use crate::map::MapResolver;
use crate::render::RenderSink;
use crate::store::{AgentStore, FrameStats, IngestOutcome};

/// Result of one frame tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// The store was busy; nothing was drawn this frame.
    Skipped,
    /// The frame ran.
    Ran {
        /// Draw counters for the frame.
        frame: FrameStats,
        /// Agents removed by the sweep.
        removed: usize,
        /// Agents remaining after the sweep.
        agents: usize,
    },
}

/// Drives an [`AgentStore`] from a frame loop and a message reader.
pub struct PlaybackScheduler {
    store: Arc<Mutex<AgentStore>>,
    resolver: Arc<dyn MapResolver + Send + Sync>,
    stats: watch::Sender<StatsSnapshot>,
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("stats", &*self.stats.borrow())
            .finish_non_exhaustive()
    }
}

impl PlaybackScheduler {
    /// Wrap `store`, resolving map coordinates through `resolver`.
    pub fn new(store: AgentStore, resolver: Arc<dyn MapResolver + Send + Sync>) -> Self {
        let (stats, _) = watch::channel(StatsSnapshot::default());
        Self {
            store: Arc::new(Mutex::new(store)),
            resolver,
            stats,
        }
    }

    /// Shared handle to the store.
    pub const fn store(&self) -> &Arc<Mutex<AgentStore>> {
        &self.store
    }

    /// Hand one decoded consumer message to the engine. Updates are
    /// ingested; stats replace the retained snapshot.
    pub async fn handle(&self, message: ConsumerMessage) -> Option<IngestOutcome> {
        match message {
            ConsumerMessage::Update(update) => Some(self.ingest(&update).await),
            ConsumerMessage::Stats(envelope) => {
                debug!(
                    envs = envelope.stats.producers,
                    viewers = envelope.stats.consumers,
                    "Relay stats received"
                );
                self.stats.send_replace(envelope.stats);
                None
            }
        }
    }

    /// Route an update into the store.
    pub async fn ingest(&self, update: &UpdateMessage) -> IngestOutcome {
        self.store.lock().await.start_animation_for_path(update)
    }

    /// Run one frame at `now`: advance every agent, then sweep.
    pub fn tick(&self, now: f64, sink: &mut dyn RenderSink) -> TickReport {
        let Ok(mut store) = self.store.try_lock() else {
            return TickReport::Skipped;
        };
        let frame = store.update_paths(now, self.resolver.as_ref(), sink);
        let removed = store.wipe_agents(now, sink);
        TickReport::Ran {
            frame,
            removed,
            agents: store.len(),
        }
    }

    /// Replace the identity filter as of `now`.
    pub async fn set_filter(&self, pattern: &str, now: f64) -> Result<usize, FilterError> {
        self.store.lock().await.set_filter(pattern, Some(now))
    }

    /// Mark every agent for removal on the next tick.
    pub async fn reset(&self) -> usize {
        self.store.lock().await.reset()
    }

    /// The most recent relay stats.
    pub fn latest_stats(&self) -> StatsSnapshot {
        *self.stats.borrow()
    }
}
