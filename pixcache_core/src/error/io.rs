//! I/O related error types

use std::path::{Path, PathBuf};
use thiserror::Error;

/// I/O error with the cache path it concerns
#[derive(Error, Debug)]
#[error("{}", format_io_error(self))]
pub struct IoError {
    /// The kind of I/O error
    pub kind: IoErrorKind,
    /// Path associated with the error (if any)
    pub path: Option<PathBuf>,
    /// Underlying I/O error (if any)
    #[source]
    pub source: Option<std::io::Error>,
}

/// Kind of I/O error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoErrorKind {
    /// Path not found
    NotFound,
    /// Permission denied
    PermissionDenied,
    /// Generic I/O error
    Other,
}

impl IoError {
    /// Create an I/O error from a standard I/O error
    pub fn from_std(source: std::io::Error) -> Self {
        let kind = match source.kind() {
            std::io::ErrorKind::NotFound => IoErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => IoErrorKind::PermissionDenied,
            _ => IoErrorKind::Other,
        };

        Self {
            kind,
            path: None,
            source: Some(source),
        }
    }

    /// Attach the path the failed operation was working on
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }
}

fn format_io_error(error: &IoError) -> String {
    match (&error.kind, &error.path) {
        (IoErrorKind::NotFound, Some(path)) => format!("Path not found: {}", path.display()),
        (IoErrorKind::NotFound, None) => "Path not found".to_string(),
        (IoErrorKind::PermissionDenied, Some(path)) => {
            format!("Permission denied for path: {}", path.display())
        }
        (IoErrorKind::PermissionDenied, None) => "Permission denied".to_string(),
        (IoErrorKind::Other, path) => {
            let location = path
                .as_ref()
                .map(|p| format!(" at {}", p.display()))
                .unwrap_or_default();
            match &error.source {
                Some(source) => format!("I/O error{location}: {source}"),
                None => format!("I/O error{location}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_std_not_found() {
        let error = IoError::from_std(io::Error::new(io::ErrorKind::NotFound, "gone"));

        assert_eq!(error.kind, IoErrorKind::NotFound);
        assert!(error.path.is_none());
        assert!(error.source.is_some());
    }

    #[test]
    fn test_permission_denied_with_path() {
        let path = Path::new("/var/cache/pixcache");
        let error = IoError::from_std(io::Error::new(io::ErrorKind::PermissionDenied, "no"))
            .with_path(path);

        assert_eq!(error.kind, IoErrorKind::PermissionDenied);
        assert!(error.to_string().contains("Permission denied"));
        assert!(error.to_string().contains("/var/cache/pixcache"));
    }

    #[test]
    fn test_other_error_display() {
        let error = IoError::from_std(io::Error::other("disk on fire")).with_path(Path::new("/x"));

        assert_eq!(error.kind, IoErrorKind::Other);
        assert!(error.to_string().contains("disk on fire"));
        assert!(error.to_string().contains("/x"));
    }
}
