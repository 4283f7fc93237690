//! Playback engine for Trailcast consumers.
//!
//! Turns a bursty stream of position batches into continuous, per-agent
//! animated motion. Each frame the [`PlaybackScheduler`] advances every
//! agent's interpolation and then sweeps retired or stale agents out of
//! the [`AgentStore`].
//!
//! # Modules
//!
//! - [`agent`] -- Per-identity state machine with its bounded batch queue
//! - [`batch`] -- One queued chunk of path points
//! - [`clock`] -- Monotonic frame clock
//! - [`config`] -- Playback tuning loaded from YAML
//! - [`duration`] -- Adaptive animation duration policy
//! - [`filter`] -- Regex identity filter over `user@stack`
//! - [`interpolate`] -- Per-frame position sampling with teleport suppression
//! - [`map`] -- Map-coordinate resolution into a global space
//! - [`render`] -- Render sink boundary
//! - [`scheduler`] -- Frame tick and ingest coordination
//! - [`sprite`] -- Facing and sprite selection
//! - [`store`] -- The keyed agent collection and its eviction policy
//!
//! [`PlaybackScheduler`]: scheduler::PlaybackScheduler
//! [`AgentStore`]: store::AgentStore

pub mod agent;
pub mod batch;
pub mod clock;
pub mod config;
pub mod duration;
pub mod filter;
pub mod interpolate;
pub mod map;
pub mod render;
pub mod scheduler;
pub mod sprite;
pub mod store;

pub use agent::{Agent, AgentPhase, AgentTick, AppendError};
pub use batch::Batch;
pub use clock::FrameClock;
pub use config::{BacklogTier, ConfigError, PlaybackConfig};
pub use filter::{FilterError, IdentityFilter};
pub use map::{FlatResolver, MapError, MapRegion, MapResolver, MapTable, Position};
pub use render::{RenderSink, TracingSink};
pub use scheduler::{PlaybackScheduler, TickReport};
pub use sprite::{Direction, SpriteState};
pub use store::{AgentStore, FrameStats, IngestOutcome};
