//! Error types for kikitori.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KikitoriError {
    // Backend errors
    #[error("No usable recognition backend on this platform: {message}")]
    BackendUnavailable { message: String },

    #[error("Recognition backend failed: {message}")]
    BackendRuntime { message: String },

    #[error("Both primary and fallback recognition backends failed")]
    DoubleFailover,

    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, KikitoriError>;
