//! Error types for reindex.
//!
//! Library crates use [`ReindexError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all reindex operations.
#[derive(Debug, thiserror::Error)]
pub enum ReindexError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure talking to a remote collaborator
    /// (connection refused, timeout, failed health probe).
    #[error("network error: {0}")]
    Network(String),

    /// The remote collaborator rejected the whole call.
    #[error("backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    /// A named remote resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Data validation error (bad identifier, invalid state transition, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A document type provider failed to build a document.
    #[error("provider error: {0}")]
    Provider(String),

    /// Response or document could not be (de)serialized.
    #[error("decode error: {0}")]
    Decode(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Operation declared in a contract but deliberately not implemented.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ReindexError>;

impl ReindexError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the remote side reported the resource as already present.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Backend { status: 409, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ReindexError::config("no indices configured");
        assert_eq!(err.to_string(), "config error: no indices configured");

        let err = ReindexError::Backend {
            status: 404,
            message: "Not Found".into(),
        };
        assert_eq!(err.to_string(), "backend error (HTTP 404): Not Found");
    }

    #[test]
    fn conflict_detection() {
        let err = ReindexError::Backend {
            status: 409,
            message: "already exists".into(),
        };
        assert!(err.is_conflict());
        assert!(!ReindexError::Network("timeout".into()).is_conflict());
    }
}
