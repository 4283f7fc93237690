//! Relay configuration.
//!
//! Values come from three layers, later layers winning: an optional
//! YAML file (`trailcast-relay.yaml`), the `TRAILCAST_HOST` and
//! `TRAILCAST_PORT` environment variables, and the `--host` / `--port`
//! command-line flags applied by the binary.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading relay configuration.
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

    /// The host and port do not form a socket address.
    #[error("invalid listen address {addr}: {reason}")]
    Address {
        /// The address that failed to parse.
        addr: String,
        /// Why it failed.
        reason: String,
    },

    /// A value is outside its usable range.
    #[error("invalid relay configuration: {reason}")]
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

/// Configuration for the relay server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Milliseconds between stats pushes to consumers.
    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,

    /// Frames buffered per consumer before new frames are dropped.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            stats_interval_ms: default_stats_interval_ms(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides.
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

    /// Check that the stats interval and queue size are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stats_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "stats_interval_ms must be at least 1".to_owned(),
            });
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "outbound_queue_capacity must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    /// Apply `TRAILCAST_HOST` / `TRAILCAST_PORT` if set. An unparseable
    /// port is ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TRAILCAST_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("TRAILCAST_PORT") {
            match val.parse() {
                Ok(port) => self.port = port,
                Err(e) => tracing::warn!(value = %val, "Ignoring TRAILCAST_PORT: {e}"),
            }
        }
    }

    /// The socket address to listen on.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::Address {
            reason: e.to_string(),
            addr,
        })
    }

    /// The stats push interval.
    pub const fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_stats_interval_ms() -> u64 {
    10_000
}

const fn default_outbound_queue_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.stats_interval(), Duration::from_secs(10));
        assert_eq!(config.outbound_queue_capacity, 256);
        assert!(config.listen_addr().is_ok());
    }

    #[test]
    fn parse_partial_yaml() {
        let config = RelayConfig::parse("stats_interval_ms: 500\noutbound_queue_capacity: 16\n");
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();
        assert_eq!(config.stats_interval_ms, 500);
        assert_eq!(config.outbound_queue_capacity, 16);
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(RelayConfig::parse("").is_ok());
    }

    #[test]
    fn zero_stats_interval_rejected() {
        assert!(matches!(
            RelayConfig::parse("stats_interval_ms: 0"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn zero_queue_capacity_rejected() {
        let config = RelayConfig {
            outbound_queue_capacity: 0,
            ..RelayConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn invalid_host_is_reported() {
        let config = RelayConfig {
            host: "not a host".to_owned(),
            ..RelayConfig::default()
        };
        assert!(matches!(
            config.listen_addr(),
            Err(ConfigError::Address { .. })
        ));
    }
}
