//! Playback tuning.
//!
//! Loaded as the `playback` section of the viewer's YAML file or on its
//! own. Every field has a default, so an empty document is a valid
//! configuration.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading playback configuration.
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

    /// A value is outside its usable range.
    #[error("invalid playback configuration: {reason}")]
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

/// One step of the backlog speed-up: when more than `above` batches are
/// waiting behind the current one, `bonus` is added to the divisor.
///
/// Written in YAML as a pair, e.g. `[3, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "(usize, f64)")]
pub struct BacklogTier {
    /// Waiting-batch count that must be exceeded.
    pub above: usize,
    /// Amount added to the speed-up divisor.
    pub bonus: f64,
}

impl From<(usize, f64)> for BacklogTier {
    fn from((above, bonus): (usize, f64)) -> Self {
        Self { above, bonus }
    }
}

/// Playback engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaybackConfig {
    /// Key agents by environment/stack instead of one agent per update.
    #[serde(default)]
    pub stacking_enabled: bool,

    /// Animation window for a single batch with no backlog, in ms.
    #[serde(default = "default_base_duration_ms")]
    pub base_duration_ms: f64,

    /// Maximum batches held per agent, the playing one included.
    #[serde(default = "default_max_batches")]
    pub max_batches: usize,

    /// Maximum points retained per batch; older points are cut first.
    #[serde(default = "default_max_path_points")]
    pub max_path_points: usize,

    /// Per-axis jump (map units) above which a frame is hidden.
    #[serde(default = "default_teleport_threshold")]
    pub teleport_threshold: f64,

    /// Lower bound on the logarithmic speed-up divisor.
    #[serde(default = "default_backlog_floor")]
    pub backlog_floor: f64,

    /// Additional speed-up steps for deep backlogs.
    #[serde(default = "default_backlog_tiers")]
    pub backlog_tiers: Vec<BacklogTier>,

    /// Optional regex over `user@stack`; non-matching agents are evicted.
    #[serde(default)]
    pub user_filter: Option<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            stacking_enabled: false,
            base_duration_ms: default_base_duration_ms(),
            max_batches: default_max_batches(),
            max_path_points: default_max_path_points(),
            teleport_threshold: default_teleport_threshold(),
            backlog_floor: default_backlog_floor(),
            backlog_tiers: default_backlog_tiers(),
            user_filter: None,
        }
    }
}

impl PlaybackConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, does not parse,
    /// or holds out-of-range values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string. An empty
    /// document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on malformed YAML or out-of-range values.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable by the duration policy and the
    /// agent queue.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };
        if !(self.base_duration_ms.is_finite() && self.base_duration_ms > 0.0) {
            return invalid("base_duration_ms must be a positive number");
        }
        if self.max_batches == 0 {
            return invalid("max_batches must be at least 1");
        }
        if self.max_path_points < 2 {
            return invalid("max_path_points must be at least 2");
        }
        if !(self.teleport_threshold.is_finite() && self.teleport_threshold > 0.0) {
            return invalid("teleport_threshold must be a positive number");
        }
        if !(self.backlog_floor.is_finite() && self.backlog_floor >= 1.0) {
            return invalid("backlog_floor must be at least 1.0");
        }
        if self
            .backlog_tiers
            .iter()
            .any(|tier| !(tier.bonus.is_finite() && tier.bonus >= 0.0))
        {
            return invalid("backlog tier bonuses must be non-negative");
        }
        Ok(())
    }
}

const fn default_base_duration_ms() -> f64 {
    12_000.0
}

const fn default_max_batches() -> usize {
    10
}

const fn default_max_path_points() -> usize {
    2048
}

const fn default_teleport_threshold() -> f64 {
    1.5
}

const fn default_backlog_floor() -> f64 {
    2.0
}

fn default_backlog_tiers() -> Vec<BacklogTier> {
    vec![
        BacklogTier {
            above: 3,
            bonus: 1.0,
        },
        BacklogTier {
            above: 7,
            bonus: 2.0,
        },
    ]
}
