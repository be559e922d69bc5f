//! Common error types for kwconnect applications.

use thiserror::Error;

/// Result type alias using kwconnect's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for host and tooling operations.
///
/// Per-request protocol failures never surface here; they are turned into
/// `{ error }` responses by the dispatcher.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket bind, read, write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Protocol error reported by the other side
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Operation timed out
    #[error("timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Create a serialization error from any displayable type.
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create a protocol error from any displayable type.
    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Create a timeout error from any displayable type.
    pub fn timeout(msg: impl std::fmt::Display) -> Self {
        Self::Timeout(msg.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}
