//! Error types shared across the workspace.

use thiserror::Error;

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Layered config could not be built or deserialized
    #[error("Configuration error: {0}")]
    Load(String),

    /// A value was present but not acceptable
    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
