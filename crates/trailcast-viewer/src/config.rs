//! Viewer configuration.
//!
//! Loaded from `trailcast-viewer.yaml` when present. The relay URL can
//! be overridden with `TRAILCAST_RELAY_URL` and then with `--relay-url`.
//! Playback tuning lives under the `playback` key and uses the same
//! fields as [`PlaybackConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use trailcast_playback::PlaybackConfig;

/// Highest accepted frame rate.
const MAX_FPS: u32 = 240;

/// Errors that can occur when loading viewer configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The playback section is out of range.
    #[error("{source}")]
    Playback {
        /// The underlying playback config error.
        #[from]
        source: trailcast_playback::ConfigError,
    },

    /// A viewer value is out of range.
    #[error("invalid viewer configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Configuration for the viewer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewerConfig {
    /// Relay consumer endpoint.
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Frames per second for the playback loop.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Optional map data JSON; without it every map sits at the origin.
    #[serde(default)]
    pub map_data: Option<PathBuf>,

    /// Playback engine tuning.
    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            fps: default_fps(),
            map_data: None,
            playback: PlaybackConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment
    /// overrides, and validate. An empty document yields the defaults.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `TRAILCAST_RELAY_URL` if set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TRAILCAST_RELAY_URL") {
            self.relay_url = val;
        }
    }

    /// Check the frame rate, URL scheme, and playback section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(ConfigError::Invalid {
                reason: format!("fps must be between 1 and {MAX_FPS}"),
            });
        }
        if !(self.relay_url.starts_with("ws://") || self.relay_url.starts_with("wss://")) {
            return Err(ConfigError::Invalid {
                reason: format!("relay_url must be a ws:// or wss:// URL, got {}", self.relay_url),
            });
        }
        self.playback.validate()?;
        Ok(())
    }

    /// Time between frames.
    pub fn frame_interval(&self) -> Duration {
        let micros = 1_000_000_u64
            .checked_div(u64::from(self.fps))
            .unwrap_or(1_000_000);
        Duration::from_micros(micros)
    }
}

fn default_relay_url() -> String {
    "ws://127.0.0.1:8080/receive".to_owned()
}

const fn default_fps() -> u32 {
    60
}
