//! Error types for the registration protocol.

use std::num::ParseIntError;
use thiserror::Error;

/// Registration protocol errors.
#[derive(Debug, Error)]
pub enum AutoregError {
    /// Network I/O error.
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before a complete token arrived.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// No delimiter within the fixed-size token buffer.
    #[error("token exceeds {capacity} byte buffer")]
    ShortBuffer { capacity: usize },

    /// Wrong marker, malformed lock/key or field.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// A numeric field is not a valid decimal number.
    #[error("invalid {field}: {source}")]
    InvalidNumber {
        field: &'static str,
        #[source]
        source: ParseIntError,
    },

    /// The received key does not match the lock that was sent.
    #[error("wrong key")]
    AuthenticationFailed,

    /// The connection deadline passed.
    #[error("timed out")]
    Timeout,

    /// The registry refused the hub.
    #[error(transparent)]
    Registry(anyhow::Error),
}

impl AutoregError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        AutoregError::Malformed(msg.into())
    }

    /// Returns true for deadline expiry, including I/O errors of kind
    /// `TimedOut`.
    pub fn is_timeout(&self) -> bool {
        match self {
            AutoregError::Timeout => true,
            AutoregError::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

impl From<tokio::time::error::Elapsed> for AutoregError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AutoregError::Timeout
    }
}

/// Result type alias for registration operations.
pub type AutoregResult<T> = Result<T, AutoregError>;
