use std::path::PathBuf;

use hub_registry::RegistryError;
use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config `{}`", path.display())]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// YAML did not match the schema.
    #[error("failed to parse config `{origin}`: {source}")]
    Parse {
        /// File path or `<inline>`.
        origin: String,
        /// Underlying parser error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Well-formed YAML with inconsistent content.
    #[error("invalid config: {reason}")]
    Invalid {
        /// Human-readable reason.
        reason: String,
    },

    /// A tool definition was rejected by the registry.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
