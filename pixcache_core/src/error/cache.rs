//! Cache tier error types

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the memory and disk tiers
#[derive(Error, Debug)]
pub enum CacheError {
    /// Writing an entry failed
    #[error("Failed to save cache entry '{key}': {reason}")]
    Save { key: String, reason: SaveFailure },

    /// Reading an entry or listing the cache folder failed
    #[error("Failed to fetch from cache at {}: {message}", path.display())]
    Fetch { path: PathBuf, message: String },

    /// Removing an entry or listing the cache folder for removal failed
    #[error("Failed to delete cache entry at {}: {message}", path.display())]
    Delete { path: PathBuf, message: String },

    /// A memory entry already exists and overwrite was not requested
    #[error("Cache entry '{key}' already exists")]
    AlreadyExists { key: String },
}

/// Reason a save did not complete
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaveFailure {
    #[error("storage path could not be resolved")]
    UnresolvedPath,

    #[error("entry already exists and overwrite was not requested")]
    AlreadyExists,

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("write failed: {0}")]
    Write(String),
}

impl CacheError {
    /// Create a save error
    pub fn save(key: impl Into<String>, reason: SaveFailure) -> Self {
        Self::Save {
            key: key.into(),
            reason,
        }
    }

    /// Create a fetch error
    pub fn fetch(path: &Path, message: impl Into<String>) -> Self {
        Self::Fetch {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a delete error
    pub fn delete(path: &Path, message: impl Into<String>) -> Self {
        Self::Delete {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Create an already-exists error for the memory tier
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Check whether this error reports a collision with an existing entry
    pub fn is_collision(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists { .. }
                | Self::Save {
                    reason: SaveFailure::AlreadyExists,
                    ..
                }
        )
    }
}
