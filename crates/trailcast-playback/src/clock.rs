//! Monotonic frame clock.
//!
//! Playback timestamps are milliseconds since the clock was created, as
//! `f64` so they can be mixed directly with interpolation progress. The
//! frame counter uses checked arithmetic.

use std::time::Instant;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Frame counter would overflow.
    #[error("frame counter overflow: cannot advance beyond u64::MAX")]
    FrameOverflow,
}

/// Source of frame timestamps for the playback loop.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    origin: Instant,
    frame: u64,
}

impl FrameClock {
    /// Start a clock at frame 0.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }

    /// Milliseconds elapsed since the clock started.
    pub fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    /// Advance the frame counter. Returns the new frame number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::FrameOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.frame = self
            .frame
            .checked_add(1)
            .ok_or(ClockError::FrameOverflow)?;
        Ok(self.frame)
    }

    /// The current frame number.
    pub const fn frame(&self) -> u64 {
        self.frame
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
