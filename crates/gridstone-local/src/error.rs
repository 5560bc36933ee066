//! Error types for the in-process cluster.

use thiserror::Error;

/// Errors produced by the local cluster engine.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Raw value that failed to parse.
        value: String,
    },

    /// The cluster shape is invalid (zero task managers or slots).
    #[error("invalid cluster configuration: {0}")]
    InvalidConfiguration(String),

    /// Failed to bind a listener.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying bind error.
        source: std::io::Error,
    },

    /// A component task did not shut down cleanly.
    #[error("shutdown error: {0}")]
    Shutdown(String),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Result type for local cluster operations.
pub type Result<T> = std::result::Result<T, Error>;
