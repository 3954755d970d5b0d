//! Error types for the relay core.
//!
//! Most public operations in this crate keep the log-and-continue contract and
//! never return these errors to the caller. The typed variants exist so the
//! building blocks can be composed and asserted on in tests.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the relay core.
#[derive(Debug, Error)]
pub enum RelayError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // Network errors
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket error talking to {endpoint}: {message}")]
    Socket {
        endpoint: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // External command errors
    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Wait loop termination
    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<ini::ParseError> for RelayError {
    fn from(err: ini::ParseError) -> Self {
        RelayError::Config {
            message: err.to_string(),
        }
    }
}

impl RelayError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            return RelayError::FileNotFound(path);
        }
        RelayError::Io {
            message: err.to_string(),
            path: Some(path),
            source: Some(err),
        }
    }

    /// Create a socket error for an established connection.
    pub fn socket(endpoint: impl ToString, err: std::io::Error) -> Self {
        RelayError::Socket {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Whether the error ended a wait loop rather than a failed operation.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            RelayError::Cancelled | RelayError::DeadlineExceeded(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelayError::Command {
            command: "ps aux".into(),
            message: "exit status 1".into(),
        };
        assert_eq!(err.to_string(), "Command `ps aux` failed: exit status 1");
    }

    #[test]
    fn test_not_found_maps_to_file_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = RelayError::io_with_path(io, "/tmp/params.dat");
        assert!(matches!(err, RelayError::FileNotFound(p) if p == PathBuf::from("/tmp/params.dat")));
    }

    #[test]
    fn test_cancellation_errors() {
        assert!(RelayError::Cancelled.is_cancellation());
        assert!(RelayError::DeadlineExceeded(std::time::Duration::from_secs(1)).is_cancellation());
        assert!(!RelayError::Other("x".into()).is_cancellation());
    }
}
