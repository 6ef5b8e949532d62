//! Error types for the classement sync tool.
//!
//! Library crates use [`ClassementError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all sync operations.
#[derive(Debug, thiserror::Error)]
pub enum ClassementError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network or TLS failure while talking to the standings API.
    #[error("transport error: {0}")]
    Transport(String),

    /// The standings API answered with a non-success status.
    #[error("upstream error: {url} answered HTTP {status}")]
    Upstream { url: String, status: u16 },

    /// A source record lacks its identifying field (team identity).
    #[error("malformed record: {message}")]
    MalformedRecord { message: String },

    /// The connected store belongs to a project that is not an allowed write target.
    #[error(
        "environment mismatch: connected to project '{connected}', expected '{expected}' (allowed: {})",
        allowed.join(", ")
    )]
    EnvironmentMismatch {
        connected: String,
        expected: String,
        allowed: Vec<String>,
    },

    /// Document store read/write/batch failure.
    #[error("store error after {written} write(s): {message}")]
    Store { message: String, written: usize },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid key, oversized batch, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ClassementError>;

impl ClassementError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-record error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a store error that happened before anything was written.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
            written: 0,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a partial-progress count to a store error.
    ///
    /// Other variants are returned untouched.
    pub fn with_written(self, count: usize) -> Self {
        match self {
            Self::Store { message, .. } => Self::Store {
                message,
                written: count,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ClassementError::config("missing allowed_projects");
        assert_eq!(err.to_string(), "config error: missing allowed_projects");

        let err = ClassementError::Upstream {
            url: "https://api.example.com/classement?page=2".into(),
            status: 503,
        };
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn environment_mismatch_lists_allowed_projects() {
        let err = ClassementError::EnvironmentMismatch {
            connected: "scratch".into(),
            expected: "classement-prod".into(),
            allowed: vec!["classement-prod".into(), "classement-staging".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'scratch'"));
        assert!(msg.contains("classement-prod, classement-staging"));
    }

    #[test]
    fn with_written_only_touches_store_errors() {
        let err = ClassementError::store("disk full").with_written(7);
        assert!(matches!(err, ClassementError::Store { written: 7, .. }));
        assert!(err.to_string().starts_with("store error after 7 write(s)"));

        let err = ClassementError::validation("bad key").with_written(3);
        assert!(matches!(err, ClassementError::Validation { .. }));
    }
}
