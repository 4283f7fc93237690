//! JSON wire messages exchanged over the relay.
//!
//! Producers send an [`UpdateMessage`]; the relay forwards the original
//! text frame to every consumer untouched and, every stats interval,
//! pushes a [`StatsEnvelope`]. Consumers decode either shape through
//! [`ConsumerMessage`].
//!
//! ```json
//! {"metadata": {"user": "alice", "env_id": 3}, "coords": [[1, 1, 0], [2, 1, 0, 8]]}
//! {"stats": {"envs": 3, "viewers": 5}}
//! ```

use serde::{Deserialize, Serialize};

/// Errors raised while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload was not valid JSON for the expected shape.
    #[error("malformed message: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// A binary frame did not contain UTF-8 text.
    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
}

/// Reasons a well-formed update is rejected before forwarding or playback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// `metadata.user` was missing or empty.
    #[error("update has an empty user")]
    EmptyUser,

    /// `coords` was missing or empty.
    #[error("update has no path")]
    EmptyPath,

    /// A coordinate tuple did not have 3 or 4 components.
    #[error("coordinate has {0} components, expected 3 or 4")]
    CoordArity(usize),
}

/// One raw path point: tile position, map id, and optional facing.
///
/// Serialized as `[x, y, map_id]` or `[x, y, map_id, direction]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct Coord {
    /// Tile x within the map.
    pub x: i64,
    /// Tile y within the map.
    pub y: i64,
    /// Which map the tile belongs to.
    pub map_id: i64,
    /// Facing reported by the producer, if any.
    pub direction: Option<i64>,
}

impl Coord {
    /// Create a coordinate without a facing.
    pub const fn new(x: i64, y: i64, map_id: i64) -> Self {
        Self {
            x,
            y,
            map_id,
            direction: None,
        }
    }

    /// Attach a producer-reported facing.
    #[must_use]
    pub const fn facing(mut self, direction: i64) -> Self {
        self.direction = Some(direction);
        self
    }
}

impl TryFrom<Vec<i64>> for Coord {
    type Error = ValidationError;

    fn try_from(parts: Vec<i64>) -> Result<Self, Self::Error> {
        match parts.as_slice() {
            [x, y, map_id] => Ok(Self::new(*x, *y, *map_id)),
            [x, y, map_id, dir] => Ok(Self::new(*x, *y, *map_id).facing(*dir)),
            other => Err(ValidationError::CoordArity(other.len())),
        }
    }
}

impl From<Coord> for Vec<i64> {
    fn from(coord: Coord) -> Self {
        let mut parts = vec![coord.x, coord.y, coord.map_id];
        if let Some(dir) = coord.direction {
            parts.push(dir);
        }
        parts
    }
}

/// Producer-supplied description of who is moving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// The producing user's name. Required and non-empty.
    #[serde(default)]
    pub user: String,
    /// Environment (emulator instance) id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_id: Option<i64>,
    /// Explicit stack id merging several envs under one agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<i64>,
    /// Display colour for the agent's label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Free-form text shown next to the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    /// Which character sprite to draw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprite_id: Option<i64>,
}

/// A batch of positions from one producer.
///
/// Both fields default when absent so that shape problems surface as a
/// [`ValidationError`] rather than a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessage {
    /// Who is moving.
    #[serde(default)]
    pub metadata: Metadata,
    /// Ordered path points, oldest first.
    #[serde(default)]
    pub coords: Vec<Coord>,
}

impl UpdateMessage {
    /// Decode an update from a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode an update from a binary frame holding UTF-8 JSON.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let text = core::str::from_utf8(bytes).map_err(|_utf8| CodecError::NotUtf8)?;
        Self::decode(text)
    }

    /// Encode the update as a JSON string.
    pub fn encode(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Check the shape rules every forwarded update must satisfy.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.metadata.user.is_empty() {
            return Err(ValidationError::EmptyUser);
        }
        if self.coords.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        Ok(())
    }
}

/// Live connection counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Number of registered producer connections.
    #[serde(rename = "envs")]
    pub producers: u64,
    /// Number of registered consumer connections.
    #[serde(rename = "viewers")]
    pub consumers: u64,
}

/// The stats message pushed to consumers: `{"stats": {...}}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsEnvelope {
    /// The counts at the time the envelope was built.
    pub stats: StatsSnapshot,
}

impl StatsEnvelope {
    /// Wrap a snapshot.
    pub const fn new(stats: StatsSnapshot) -> Self {
        Self { stats }
    }

    /// Encode the envelope as a JSON string.
    pub fn encode(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Anything a consumer can receive from the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConsumerMessage {
    /// Periodic connection counts.
    Stats(StatsEnvelope),
    /// A forwarded producer update.
    Update(UpdateMessage),
}

impl ConsumerMessage {
    /// Decode a consumer-side text frame.
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(text)?)
    }
}
