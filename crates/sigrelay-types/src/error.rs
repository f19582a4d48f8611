//! Configuration errors.

use thiserror::Error;

/// Error raised while loading or validating an [`AdapterConfig`](crate::config::AdapterConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required setting is absent or empty.
    #[error("required setting '{0}' not found")]
    Missing(&'static str),

    /// A setting is present but unusable.
    #[error("invalid setting '{key}': {reason}")]
    Invalid {
        /// The offending key.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The config file could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for Result with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
