//! Error types for the pixcache core library
//!
//! Errors are grouped by the layer that raises them so that callers can decide
//! which failures are fatal and which are merely a missed cache tier.

use thiserror::Error;

pub mod cache;
pub mod download;
pub mod io;
pub mod validation;

pub use self::cache::{CacheError, SaveFailure};
pub use self::download::DownloadError;
pub use self::io::{IoError, IoErrorKind};
pub use self::validation::ValidationError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the pixcache core library
///
/// Errors are categorized into four main types:
/// - Cache errors: memory and disk tier failures
/// - Download errors: fetch layer and transport failures
/// - I/O errors: filesystem preparation failures
/// - Validation errors: configuration and input validation
#[derive(Error, Debug)]
pub enum Error {
    /// Cache tier errors
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Download errors
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// I/O related errors
    #[error(transparent)]
    Io(#[from] IoError),

    /// Validation related errors
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io(IoError::from_std(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;
    use std::io;
    use std::path::Path;

    #[test]
    fn test_cache_error_is_transparent() {
        let error: Error = CacheError::already_exists("https://example.com/a.png").into();

        assert!(matches!(error, Error::Cache(CacheError::AlreadyExists { .. })));
        assert!(error.to_string().contains("already exists"));
        assert!(error.to_string().contains("https://example.com/a.png"));
    }

    #[test]
    fn test_download_error_conversion() {
        let error: Error = DownloadError::bad_status(503).into();

        match error {
            Error::Download(DownloadError::BadStatus { status }) => assert_eq!(status, 503),
            _ => panic!("Expected Download::BadStatus error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let error: Error = io_error.into();

        match error {
            Error::Io(io_err) => assert_eq!(io_err.kind, IoErrorKind::PermissionDenied),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_save_error_display_includes_reason() {
        let error: Error = CacheError::save("images/a", SaveFailure::UnresolvedPath).into();
        let display = error.to_string();

        assert!(display.contains("images/a"));
        assert!(display.contains("storage path"));
    }

    #[test]
    fn test_delete_error_keeps_path() {
        let path = Path::new("/tmp/pixcache/images/a");
        let error = CacheError::delete(path, "busy");

        match error {
            CacheError::Delete { path: error_path, .. } => assert_eq!(error_path, path),
            _ => panic!("Expected Delete error"),
        }
    }

    #[test]
    fn test_error_trait_implementation() {
        let error = Error::Validation(ValidationError::invalid_configuration("zero capacity"));
        let _: &dyn StdError = &error;
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<u64> {
            Ok(42)
        }

        assert_eq!(returns_result().ok(), Some(42));
    }
}
