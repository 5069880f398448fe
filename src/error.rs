//! Error types and handling infrastructure for tailscan.
//!
//! One `thiserror` enum covers every failure the library can report to a caller.
//! Background loops (watcher and search) never return these errors across the
//! thread boundary: they log them and keep going, and the consumer only sees the
//! documented engine events.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for tailscan operations.
#[derive(Error, Debug)]
pub enum TailscanError {
    /// File system related errors (permission denied, read failure, etc.)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// File not found specifically (common case for user feedback)
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Path exists but is not a regular file
    #[error("Path is not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// Column set, format or matcher configuration cannot be used
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// A search or row-split pattern failed to compile
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A row or record could not be decoded
    #[error("Decode error: {message}")]
    DecodeError { message: String },

    /// Search lifecycle errors
    #[error("Search operation failed: {message}")]
    SearchError { message: String },

    /// Generic error for cases not covered by specific variants
    #[error("Operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for tailscan operations.
pub type Result<T> = std::result::Result<T, TailscanError>;

impl TailscanError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create an InvalidPattern error for the given pattern
    pub fn pattern(pattern: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }

    /// Create a DecodeError with a descriptive message
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeError {
            message: message.into(),
        }
    }

    /// Create a SearchError with a descriptive message
    pub fn search(message: impl Into<String>) -> Self {
        Self::SearchError {
            message: message.into(),
        }
    }

    /// Create a generic Other error with a descriptive message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// True for errors caused by the configuration rather than the environment
    pub fn is_config(&self) -> bool {
        matches!(self, Self::ConfigError { .. } | Self::InvalidPattern { .. })
    }
}

impl From<std::io::Error> for TailscanError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}
