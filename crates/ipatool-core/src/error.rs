//! Error types for the ipatool orchestration core.
//!
//! Top-level operations surface these to the caller. Per-item ownership
//! checks consume them internally and never let them escape.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure text the tool emits when the account holds no license for an app.
pub const LICENSE_REQUIRED_MARKER: &str = "license is required";

/// Main error type for the ipatool core.
#[derive(Debug, Error)]
pub enum IpatoolError {
    // Process errors
    #[error("Failed to execute {path:?}: {message}")]
    Execution {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    // Payload errors
    #[error("Failed to decode tool output: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation was cancelled")]
    Cancelled,
}

/// Result type alias for ipatool operations.
pub type Result<T> = std::result::Result<T, IpatoolError>;

impl From<std::io::Error> for IpatoolError {
    fn from(err: std::io::Error) -> Self {
        IpatoolError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for IpatoolError {
    fn from(err: serde_json::Error) -> Self {
        IpatoolError::Decode {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for IpatoolError {
    fn from(err: reqwest::Error) -> Self {
        IpatoolError::Network {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl IpatoolError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        IpatoolError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a decode error that has no underlying serde error.
    pub fn decode(message: impl Into<String>) -> Self {
        IpatoolError::Decode {
            message: message.into(),
            source: None,
        }
    }

    /// Whether the tool reported that the account holds no license.
    ///
    /// This is authoritative for ownership checks: it is never retried.
    pub fn is_license_required(&self) -> bool {
        match self {
            IpatoolError::CommandFailed(message) => message
                .to_lowercase()
                .contains(LICENSE_REQUIRED_MARKER),
            _ => false,
        }
    }

    /// Check if this error should trigger another ownership-check attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            IpatoolError::CommandFailed(_) => !self.is_license_required(),
            IpatoolError::Execution { .. }
            | IpatoolError::Timeout(_)
            | IpatoolError::Decode { .. }
            | IpatoolError::Network { .. }
            | IpatoolError::Io { .. } => true,
            IpatoolError::InvalidInput(_)
            | IpatoolError::Config { .. }
            | IpatoolError::Cancelled => false,
        }
    }
}
