//! Client error types.

use thiserror::Error;

/// Errors produced by the administrative client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The coordinator hello line was missing or malformed.
    #[error("handshake failed, coordinator sent {got:?}")]
    Handshake {
        /// The line received instead of a hello.
        got: String,
    },

    /// The coordinator replied with something unexpected.
    #[error("protocol error: expected {expected}, got {got:?}")]
    Protocol {
        /// What the client was waiting for.
        expected: &'static str,
        /// The reply received.
        got: String,
    },

    /// Job names are single-line tokens.
    #[error("invalid job name {name:?}: must not contain line breaks")]
    InvalidJobName {
        /// The rejected name.
        name: String,
    },
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
