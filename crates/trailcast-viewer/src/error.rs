//! Error types for the viewer binary.
//!
//! [`ViewerError`] wraps every failure that can stop the viewer during
//! startup, so `main` can propagate with `?`.

/// Top-level error for the viewer binary.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    /// Viewer configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: crate::config::ConfigError,
    },

    /// Map data could not be loaded.
    #[error("map data error: {source}")]
    Map {
        /// The underlying map error.
        #[from]
        source: trailcast_playback::MapError,
    },

    /// The configured identity filter does not compile.
    #[error("filter error: {source}")]
    Filter {
        /// The underlying filter error.
        #[from]
        source: trailcast_playback::FilterError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
