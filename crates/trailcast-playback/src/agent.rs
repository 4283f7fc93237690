//! Per-identity playback state.
//!
//! # Lifecycle
//!
//! ```text
//! Active(0) --(current finishes, next queued)--> Active(1) ...
//! Active(n) --(current starts, nothing queued)--> Draining
//! Draining  --(batch appended)--> Active(n)
//! Draining  --(current finishes)--> Retired
//! any       --(evicted)--> Retired
//! ```
//!
//! `Retired` is terminal: the agent sets its `pending_delete` flag and
//! the next sweep removes it from the store.

use std::collections::VecDeque;

use trailcast_types::{AgentKey, UpdateMessage};

use crate::batch::Batch;
use crate::config::PlaybackConfig;
use crate::duration::animation_duration_ms;
use crate::interpolate::{self, Sample};
use crate::map::{MapResolver, Position};
use crate::render::RenderSink;
use crate::sprite::{Direction, SpriteState, parse_tint};

/// Where an agent is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    /// Playing (or about to play) the batch with this index, counted
    /// from the agent's first batch.
    Active {
        /// Number of batches finished before the current one.
        batch_idx: usize,
    },
    /// Playing its only batch; nothing is queued behind it.
    Draining,
    /// Marked for removal.
    Retired,
}

/// Why an update could not be queued on an existing agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AppendError {
    /// The agent already holds its maximum number of batches. The new
    /// batch is dropped.
    #[error("batch queue full ({capacity} batches)")]
    QueueFull {
        /// The configured per-agent batch limit.
        capacity: usize,
    },

    /// The agent is pending deletion and accepts nothing further.
    #[error("agent is retiring")]
    Retiring,
}

/// A drawable frame produced by one agent tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Global position.
    pub position: Position,
    /// Sprite selection.
    pub sprite: SpriteState,
    /// Caption shown with the sprite.
    pub label: String,
}

/// Result of advancing one agent by a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentTick {
    /// Draw this frame.
    Draw(Frame),
    /// Position advanced across a jump; not drawn this frame.
    Hidden(Position),
    /// The agent just retired; its view should be released.
    Retired,
    /// The agent was already retired; nothing to do.
    Idle,
}

/// One animated identity with its bounded batch queue.
#[derive(Debug, Clone)]
pub struct Agent {
    key: AgentKey,
    batches: VecDeque<Batch>,
    batches_played: usize,
    animation_duration_ms: f64,
    direction: Direction,
    position: Option<Position>,
    pending_delete: bool,
    view_released: bool,
}

impl Agent {
    /// Create an agent playing `update` as its first batch.
    pub fn new(key: AgentKey, update: &UpdateMessage, config: &PlaybackConfig) -> Self {
        let mut batches = VecDeque::with_capacity(config.max_batches);
        batches.push_back(Batch::from_update(update, config.max_path_points));
        let mut agent = Self {
            key,
            batches,
            batches_played: 0,
            animation_duration_ms: config.base_duration_ms,
            direction: Direction::default(),
            position: None,
            pending_delete: false,
            view_released: false,
        };
        agent.recompute_duration(config);
        agent
    }

    /// The identity this agent animates.
    pub const fn key(&self) -> &AgentKey {
        &self.key
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> AgentPhase {
        if self.pending_delete {
            return AgentPhase::Retired;
        }
        let started = self
            .batches
            .front()
            .is_some_and(|batch| batch.start_time().is_some());
        if started && self.batches.len() <= 1 {
            AgentPhase::Draining
        } else {
            AgentPhase::Active {
                batch_idx: self.batches_played,
            }
        }
    }

    /// Batches held, the playing one included.
    pub fn queued(&self) -> usize {
        self.batches.len()
    }

    /// The batch currently playing.
    pub fn current(&self) -> Option<&Batch> {
        self.batches.front()
    }

    /// Animation window currently applied to the playing batch.
    pub const fn animation_duration_ms(&self) -> f64 {
        self.animation_duration_ms
    }

    /// Last sampled position, if the agent has been ticked.
    pub const fn position(&self) -> Option<Position> {
        self.position
    }

    /// Current facing.
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether the agent is marked for removal.
    pub const fn is_pending_delete(&self) -> bool {
        self.pending_delete
    }

    /// Queue `update` behind the current batch.
    ///
    /// Returns the number of batches now held.
    ///
    /// # Errors
    ///
    /// [`AppendError::Retiring`] once the agent is pending deletion;
    /// [`AppendError::QueueFull`] when it already holds
    /// `max_batches`. In both cases the update is dropped.
    pub fn append(
        &mut self,
        update: &UpdateMessage,
        config: &PlaybackConfig,
    ) -> Result<usize, AppendError> {
        if self.pending_delete {
            return Err(AppendError::Retiring);
        }
        if self.batches.len() >= config.max_batches {
            return Err(AppendError::QueueFull {
                capacity: config.max_batches,
            });
        }
        self.batches
            .push_back(Batch::from_update(update, config.max_path_points));
        self.recompute_duration(config);
        Ok(self.batches.len())
    }

    /// Advance playback to `now` and sample this frame.
    pub fn update_path(
        &mut self,
        now: f64,
        resolver: &dyn MapResolver,
        config: &PlaybackConfig,
    ) -> AgentTick {
        if self.pending_delete {
            return AgentTick::Idle;
        }
        let Some(current) = self.batches.front_mut() else {
            self.mark_pending_delete();
            return AgentTick::Retired;
        };
        let start = current.start_at(now);
        let mut progress = interpolate::progress(now - start, self.animation_duration_ms);

        if progress >= 1.0 {
            if self.batches.len() > 1 {
                self.advance(now, config);
                progress = 0.0;
            } else {
                self.mark_pending_delete();
                return AgentTick::Retired;
            }
        }

        let Some(batch) = self.batches.front() else {
            self.mark_pending_delete();
            return AgentTick::Retired;
        };
        let Some(sample) =
            interpolate::sample(batch.path(), progress, resolver, config.teleport_threshold)
        else {
            self.mark_pending_delete();
            return AgentTick::Retired;
        };
        self.apply(sample)
    }

    /// Whether the playing batch started more than `window_ms` before
    /// `now` with nothing queued behind it.
    pub fn is_stale(&self, now: f64, window_ms: f64) -> bool {
        !self.pending_delete
            && self.batches.len() <= 1
            && self
                .batches
                .front()
                .and_then(Batch::start_time)
                .is_some_and(|start| now - start > window_ms)
    }

    /// Mark the agent for removal. Returns `true` if it was not already
    /// marked.
    pub const fn mark_pending_delete(&mut self) -> bool {
        let newly = !self.pending_delete;
        self.pending_delete = true;
        newly
    }

    /// Whether this agent's view has already been released.
    pub const fn is_view_released(&self) -> bool {
        self.view_released
    }

    /// Release this agent's view from `sink`, at most once.
    pub fn release_view(&mut self, sink: &mut dyn RenderSink) {
        if !self.view_released {
            self.view_released = true;
            sink.release(&self.key);
        }
    }

    /// Caption for the sprite: the user, followed by the batch's extra
    /// text when present.
    pub fn label(&self) -> String {
        match self.current().and_then(Batch::extra) {
            Some(extra) if !extra.is_empty() => format!("{} {extra}", self.key.user),
            _ => self.key.user.clone(),
        }
    }

    /// Finish the playing batch and start the next one where it ended.
    fn advance(&mut self, now: f64, config: &PlaybackConfig) {
        let Some(finished) = self.batches.pop_front() else {
            return;
        };
        self.batches_played = self.batches_played.saturating_add(1);
        if let Some(next) = self.batches.front_mut() {
            if let Some(joint) = finished.last_point() {
                next.splice_front(joint, config.max_path_points);
            }
            next.start_at(now);
        }
        self.recompute_duration(config);
    }

    fn apply(&mut self, sample: Sample) -> AgentTick {
        self.position = Some(sample.position);
        if let Some(direction) = sample.direction {
            self.direction = direction;
        }
        if sample.hidden {
            return AgentTick::Hidden(sample.position);
        }
        AgentTick::Draw(Frame {
            position: sample.position,
            sprite: SpriteState {
                sprite_id: self.current().and_then(Batch::sprite_id).unwrap_or(0),
                direction: self.direction,
                walking: sample.walking,
                tint: self.current().and_then(Batch::color).and_then(parse_tint),
            },
            label: self.label(),
        })
    }

    fn recompute_duration(&mut self, config: &PlaybackConfig) {
        self.animation_duration_ms =
            animation_duration_ms(config, self.batches.iter().map(Batch::len));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use trailcast_types::{Coord, Metadata, StackId};

    use super::*;
    use crate::map::FlatResolver;

    fn update(xs: std::ops::Range<i64>) -> UpdateMessage {
        UpdateMessage {
            metadata: Metadata {
                user: "alice".to_owned(),
                ..Metadata::default()
            },
            coords: xs.map(|x| Coord::new(x, 0, 0)).collect(),
        }
    }

    fn stacking() -> PlaybackConfig {
        PlaybackConfig {
            stacking_enabled: true,
            ..PlaybackConfig::default()
        }
    }

    fn agent(config: &PlaybackConfig) -> Agent {
        Agent::new(AgentKey::new("alice", StackId::Explicit(1)), &update(1..4), config)
    }

    fn drawn_x(tick: &AgentTick) -> f64 {
        match tick {
            AgentTick::Draw(frame) => frame.position.x,
            other => panic!("expected a drawn frame, got {other:?}"),
        }
    }

    #[test]
    fn new_agent_is_active_at_zero() {
        let agent = agent(&PlaybackConfig::default());
        assert_eq!(agent.phase(), AgentPhase::Active { batch_idx: 0 });
        assert_eq!(agent.queued(), 1);
    }

    #[test]
    fn queue_is_capped_and_newest_dropped() {
        let config = stacking();
        let mut agent = agent(&config);
        for i in 0..9 {
            agent.append(&update(i..i + 2), &config).unwrap();
        }
        assert_eq!(
            agent.append(&update(100..102), &config),
            Err(AppendError::QueueFull { capacity: 10 })
        );
        assert_eq!(agent.queued(), 10);
        assert!(
            agent
                .batches
                .iter()
                .all(|b| b.path().first().is_some_and(|c| c.x < 100))
        );
    }

    #[test]
    fn playback_is_continuous_across_batches() {
        let config = stacking();
        let resolver = FlatResolver;
        let mut agent = agent(&config);
        agent.append(&update(4..7), &config).unwrap();

        let first = agent.update_path(0.0, &resolver, &config);
        assert!((drawn_x(&first) - 1.0).abs() < 1e-9);
        let window = agent.animation_duration_ms();

        // Just before the end the agent is near the last point of batch one.
        let late = agent.update_path(window - 1.0, &resolver, &config);
        assert!(drawn_x(&late) > 2.9);

        // Crossing the boundary starts batch two on the spliced point.
        let boundary = agent.update_path(window, &resolver, &config);
        assert_eq!(agent.phase(), AgentPhase::Draining);
        assert!((drawn_x(&boundary) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn finishing_the_last_batch_retires() {
        let config = PlaybackConfig::default();
        let resolver = FlatResolver;
        let mut agent = agent(&config);

        agent.update_path(0.0, &resolver, &config);
        assert_eq!(agent.phase(), AgentPhase::Draining);
        assert_eq!(
            agent.update_path(config.base_duration_ms, &resolver, &config),
            AgentTick::Retired
        );
        assert_eq!(agent.phase(), AgentPhase::Retired);
        assert_eq!(agent.update_path(1e9, &resolver, &config), AgentTick::Idle);
        assert_eq!(agent.append(&update(0..2), &config), Err(AppendError::Retiring));
    }

    #[test]
    fn second_batch_shortens_the_window() {
        let config = stacking();
        let mut agent = agent(&config);
        let before = agent.animation_duration_ms();
        agent.append(&update(5..8), &config).unwrap();
        assert!(agent.animation_duration_ms() < before);
    }

    #[test]
    fn staleness_needs_an_empty_queue() {
        let config = stacking();
        let resolver = FlatResolver;
        let mut agent = agent(&config);
        agent.update_path(0.0, &resolver, &config);
        assert!(agent.is_stale(12_001.0, 12_000.0));
        agent.append(&update(5..8), &config).unwrap();
        assert!(!agent.is_stale(12_001.0, 12_000.0));
    }

    #[test]
    fn frames_carry_the_producer_tint() {
        let config = PlaybackConfig::default();
        let mut msg = update(0..3);
        msg.metadata.color = Some("#3366cc".to_owned());
        let mut agent = Agent::new(AgentKey::new("alice", StackId::Explicit(1)), &msg, &config);

        match agent.update_path(0.0, &FlatResolver, &config) {
            AgentTick::Draw(frame) => assert_eq!(frame.sprite.tint, Some(0x0033_66cc)),
            other => panic!("expected a drawn frame, got {other:?}"),
        }
    }

    #[test]
    fn label_includes_extra() {
        let config = PlaybackConfig::default();
        let mut msg = update(0..2);
        msg.metadata.extra = Some("lv 12".to_owned());
        let agent = Agent::new(AgentKey::new("alice", StackId::Explicit(1)), &msg, &config);
        assert_eq!(agent.label(), "alice lv 12");
    }
}
