//! Render sink boundary.
//!
//! The playback engine decides where every agent is each frame; what is
//! done with that (a canvas, a terminal, a log) is a [`RenderSink`].

use trailcast_types::AgentKey;
use tracing::trace;

use crate::map::Position;
use crate::sprite::SpriteState;

/// Receives per-frame draw calls from the scheduler.
pub trait RenderSink {
    /// Draw `key` at `position` this frame.
    fn draw(&mut self, key: &AgentKey, position: Position, sprite: SpriteState, label: &str);

    /// Free whatever the sink holds for `key`. Called once, as soon as
    /// the agent retires. Unknown keys are ignored.
    fn release(&mut self, key: &AgentKey);
}

/// Sink that logs every frame at `trace` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    draws: u64,
    releases: u64,
}

impl TracingSink {
    /// A sink with zeroed counters.
    pub const fn new() -> Self {
        Self {
            draws: 0,
            releases: 0,
        }
    }

    /// Draw calls received.
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    /// Release calls received.
    pub const fn releases(&self) -> u64 {
        self.releases
    }
}

impl RenderSink for TracingSink {
    fn draw(&mut self, key: &AgentKey, position: Position, sprite: SpriteState, label: &str) {
        self.draws = self.draws.saturating_add(1);
        trace!(
            agent = %key,
            x = position.x,
            y = position.y,
            sprite_id = sprite.sprite_id,
            direction = %sprite.direction,
            walking = sprite.walking,
            tint = ?sprite.tint,
            label,
            "draw"
        );
    }

    fn release(&mut self, key: &AgentKey) {
        self.releases = self.releases.saturating_add(1);
        trace!(agent = %key, "release");
    }
}
