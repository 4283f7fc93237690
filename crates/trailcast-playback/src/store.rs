//! The keyed agent collection.
//!
//! Exactly one [`Agent`] exists per [`AgentKey`]. Updates either create
//! an agent or queue onto the existing one; each frame every agent is
//! advanced, and a sweep then removes those marked for deletion.
//!
//! # Eviction
//!
//! [`AgentStore::evict`] marks agents without removing them:
//!
//! - with no timestamp, every agent is marked (a full reset);
//! - with a timestamp, agents that fail the identity filter and agents
//!   whose lone batch started more than one base window ago are marked.
//!
//! [`AgentStore::wipe_agents`] evicts and then removes everything marked.
//! It is idempotent for a fixed timestamp.

use std::collections::BTreeMap;

use tracing::{debug, info};
use trailcast_types::{AgentKey, UpdateMessage, ValidationError};

use crate::agent::{Agent, AgentTick, AppendError};
use crate::config::PlaybackConfig;
use crate::filter::{FilterError, IdentityFilter};
use crate::map::MapResolver;
use crate::render::RenderSink;

/// What happened to one ingested update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new agent was created for the update's key.
    Created(AgentKey),
    /// The update was queued on an existing agent, which now holds
    /// `queued` batches.
    Appended {
        /// The agent's key.
        key: AgentKey,
        /// Batches held after the append.
        queued: usize,
    },
    /// The agent's queue was full; the update was dropped.
    Dropped(AgentKey),
    /// The key does not pass the identity filter.
    Filtered(AgentKey),
    /// The update failed shape validation.
    Invalid(ValidationError),
}

/// Counters for one [`AgentStore::update_paths`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Agents drawn.
    pub drawn: usize,
    /// Agents hidden across a jump.
    pub hidden: usize,
    /// Agents that retired this frame.
    pub retired: usize,
}

/// All live agents, keyed by identity.
#[derive(Debug)]
pub struct AgentStore {
    config: PlaybackConfig,
    filter: IdentityFilter,
    agents: BTreeMap<AgentKey, Agent>,
    /// Keys whose retiring agent was replaced before its view was
    /// released. Released at the start of the next frame.
    orphaned: Vec<AgentKey>,
}

impl AgentStore {
    /// Create an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the configured `user_filter` does not
    /// compile.
    pub fn new(config: PlaybackConfig) -> Result<Self, FilterError> {
        let filter = match config.user_filter.as_deref() {
            Some(pattern) => IdentityFilter::new(pattern)?,
            None => IdentityFilter::allow_all(),
        };
        Ok(Self {
            config,
            filter,
            agents: BTreeMap::new(),
            orphaned: Vec::new(),
        })
    }

    /// The active configuration.
    pub const fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// The active identity filter.
    pub const fn filter(&self) -> &IdentityFilter {
        &self.filter
    }

    /// Number of agents held, including those pending deletion.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the store holds no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Look up an agent.
    pub fn get(&self, key: &AgentKey) -> Option<&Agent> {
        self.agents.get(key)
    }

    /// All keys, in order.
    pub fn keys(&self) -> impl Iterator<Item = &AgentKey> {
        self.agents.keys()
    }

    /// Route an update to its agent, creating one if needed.
    ///
    /// An agent that is pending deletion is replaced by a fresh one so
    /// the update is not lost between retirement and the next sweep.
    pub fn start_animation_for_path(&mut self, update: &UpdateMessage) -> IngestOutcome {
        if let Err(reason) = update.validate() {
            debug!(%reason, "Ignoring invalid update");
            return IngestOutcome::Invalid(reason);
        }
        let key = AgentKey::for_metadata(&update.metadata, self.config.stacking_enabled);
        if !self.filter.matches(&key) {
            return IngestOutcome::Filtered(key);
        }

        match self.agents.get_mut(&key) {
            Some(agent) if !agent.is_pending_delete() => match agent.append(update, &self.config)
            {
                Ok(queued) => IngestOutcome::Appended { key, queued },
                Err(AppendError::QueueFull { capacity }) => {
                    debug!(agent = %key, capacity, "Batch queue full, dropping update");
                    IngestOutcome::Dropped(key)
                }
                Err(AppendError::Retiring) => IngestOutcome::Dropped(key),
            },
            _ => {
                let agent = Agent::new(key.clone(), update, &self.config);
                let replaced = self.agents.insert(key.clone(), agent);
                if replaced.is_some_and(|old| !old.is_view_released()) {
                    self.orphaned.push(key.clone());
                }
                debug!(
                    agent = %key,
                    anonymous = key.stack.is_anonymous(),
                    points = update.coords.len(),
                    "Agent created"
                );
                IngestOutcome::Created(key)
            }
        }
    }

    /// Advance every agent to `now`, drawing through `sink`. Agents that
    /// retire are released from the sink immediately.
    ///
    /// Views left behind by replaced agents are released before anything
    /// is drawn, so the replacement's first draw recreates the view.
    pub fn update_paths(
        &mut self,
        now: f64,
        resolver: &dyn MapResolver,
        sink: &mut dyn RenderSink,
    ) -> FrameStats {
        for key in self.orphaned.drain(..) {
            sink.release(&key);
        }
        let mut stats = FrameStats::default();
        for (key, agent) in &mut self.agents {
            match agent.update_path(now, resolver, &self.config) {
                AgentTick::Draw(frame) => {
                    sink.draw(key, frame.position, frame.sprite, &frame.label);
                    stats.drawn = stats.drawn.saturating_add(1);
                }
                AgentTick::Hidden(_) => {
                    stats.hidden = stats.hidden.saturating_add(1);
                }
                AgentTick::Retired => {
                    agent.release_view(sink);
                    stats.retired = stats.retired.saturating_add(1);
                }
                AgentTick::Idle => {}
            }
        }
        stats
    }

    /// Mark agents for deletion. See the module docs for the rules.
    /// Returns the number of agents newly marked.
    pub fn evict(&mut self, cutoff: Option<f64>) -> usize {
        let window = self.config.base_duration_ms;
        let mut marked = 0_usize;
        for (key, agent) in &mut self.agents {
            let evict = cutoff.is_none_or(|now| {
                !self.filter.matches(key) || agent.is_stale(now, window)
            });
            if evict && agent.mark_pending_delete() {
                marked = marked.saturating_add(1);
            }
        }
        marked
    }

    /// Evict as of `now`, then remove every agent pending deletion,
    /// releasing any view not already released. Returns the number
    /// removed.
    pub fn wipe_agents(&mut self, now: f64, sink: &mut dyn RenderSink) -> usize {
        self.evict(Some(now));
        let before = self.agents.len();
        self.agents.retain(|_, agent| {
            if agent.is_pending_delete() {
                agent.release_view(sink);
                false
            } else {
                true
            }
        });
        let removed = before.saturating_sub(self.agents.len());
        if removed > 0 {
            debug!(removed, remaining = self.agents.len(), "Agents swept");
        }
        removed
    }

    /// Replace the identity filter.
    ///
    /// With a timestamp, agents that no longer match are marked at once.
    /// Without one, every agent is marked. Removal happens on the next
    /// sweep either way.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] and leaves the current filter in place if
    /// `pattern` does not compile.
    pub fn set_filter(&mut self, pattern: &str, now: Option<f64>) -> Result<usize, FilterError> {
        self.filter = IdentityFilter::new(pattern)?;
        self.config.user_filter = self.filter.pattern().map(str::to_owned);
        let marked = self.evict(now);
        info!(pattern = self.filter.pattern().unwrap_or(""), marked, "Identity filter changed");
        Ok(marked)
    }

    /// Mark every agent for deletion.
    pub fn reset(&mut self) -> usize {
        self.evict(None)
    }
}
