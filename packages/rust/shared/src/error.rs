//! Error types for s3-antivirus.
//!
//! Library crates use [`AntivirusError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use crate::keys::KeyDecodeError;

/// Failure reported by a blob store adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The requested object does not exist.
    #[error("NoSuchKey: the specified key does not exist: {bucket}/{key}")]
    NoSuchKey { bucket: String, key: String },

    /// Any other store failure, message preserved from the backend.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn no_such_key(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NoSuchKey {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this error means the object is absent.
    pub fn is_no_such_key(&self) -> bool {
        matches!(self, Self::NoSuchKey { .. })
    }
}

/// Top-level error type for all s3-antivirus operations.
#[derive(Debug, thiserror::Error)]
pub enum AntivirusError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Malformed input that is not a key encoding problem.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The trigger event carried a badly percent-encoded object key.
    #[error("failed to unescape object key: {0}")]
    InvalidKey(#[source] KeyDecodeError),

    /// The scratch file could not be created or written.
    #[error("failed to create file: {0}")]
    ScratchFile(#[source] std::io::Error),

    /// The triggering object could not be downloaded.
    #[error("failed to download file: {0}")]
    Download(#[source] StoreError),

    /// The scan or update engine could not be invoked.
    #[error("{0}")]
    Engine(String),

    /// Fetching the object's tag set failed.
    #[error("failed to get tags: {0}")]
    GetTags(#[source] StoreError),

    /// Writing the object's tag set failed.
    #[error("failed to write tags: {0}")]
    PutTags(#[source] StoreError),

    /// Store failure while transferring definition files.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AntivirusError>;

impl AntivirusError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an engine error from any displayable message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is an I/O error caused by a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = AntivirusError::config("missing tag key");
        assert_eq!(err.to_string(), "config error: missing tag key");

        let err = AntivirusError::Download(StoreError::other("file does not exist"));
        assert_eq!(err.to_string(), "failed to download file: file does not exist");

        let err = AntivirusError::engine("clamav returned exit code 82");
        assert_eq!(err.to_string(), "clamav returned exit code 82");
    }

    #[test]
    fn tag_errors_name_their_stage() {
        let get = AntivirusError::GetTags(StoreError::other("file does not exist"));
        assert_eq!(get.to_string(), "failed to get tags: file does not exist");

        let put = AntivirusError::PutTags(StoreError::other("invalid tag"));
        assert_eq!(put.to_string(), "failed to write tags: invalid tag");
    }

    #[test]
    fn no_such_key_is_detectable() {
        let err = StoreError::no_such_key("a-bucket", "main.cvd");
        assert!(err.is_no_such_key());
        assert!(err.to_string().contains("a-bucket/main.cvd"));
        assert!(!StoreError::other("boom").is_no_such_key());
    }

    #[test]
    fn not_found_io_is_detectable() {
        let err = AntivirusError::io(
            "/tmp/missing",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert!(!AntivirusError::validation("x").is_not_found());
    }
}
