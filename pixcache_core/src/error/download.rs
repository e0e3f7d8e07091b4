//! Download layer error types

use thiserror::Error;

/// Outcome of a fetch that did not produce a fresh payload
///
/// The type is `Clone` because a single coalesced fetch hands the same
/// outcome to every waiter that joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// The resource identifier could not be parsed
    #[error("Invalid resource key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Network or I/O failure in the transport
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Response status outside the accepted success range
    #[error("Unexpected response status: {status}")]
    BadStatus { status: u16 },

    /// A conditional fetch confirmed the cached copy is current
    #[error("Resource not modified since the supplied validator")]
    NotChanged,

    /// The fetch was abandoned before the transport produced a result
    #[error("Fetch was cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Create an invalid key error
    pub fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a bad status error
    pub fn bad_status(status: u16) -> Self {
        Self::BadStatus { status }
    }

    /// Check whether this outcome means "keep what you have"
    pub fn is_not_changed(&self) -> bool {
        matches!(self, Self::NotChanged)
    }

    /// Check if this error is transient and a later fetch may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Cancelled => true,
            Self::BadStatus { status } => matches!(status, 408 | 429 | 500..=504),
            Self::InvalidKey { .. } | Self::NotChanged => false,
        }
    }
}
