//! Error handling for TLD WHOIS resolution.
//!
//! This module defines the error type shared by every stage of a run, from
//! fatal setup failures (feed, output file) to the per-identifier failures
//! that end up inside a [`QueryOutcome`](crate::QueryOutcome).

use crate::types::QueryStatus;
use std::fmt;
use std::time::Duration;

/// Main error type for the library.
///
/// Per-identifier variants (`NetworkError`, `Timeout`, `NotFound`,
/// `ProtocolError`) are contained by the query worker and never abort a run.
/// Setup variants (`FeedError`, `SinkError`, `ConfigError`, `FileError`) are
/// fatal.
#[derive(Debug, Clone)]
pub enum TldWhoisError {
    /// Network-related errors (connection refused, reset, etc.)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// The response ended without a line carrying the marker prefix
    NotFound { identifier: String, marker: String },

    /// The marker line was present but could not be interpreted
    ProtocolError { identifier: String, message: String },

    /// Timeout errors when a connect or read phase takes too long
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The identifier feed could not be fetched or read
    FeedError { location: String, message: String },

    /// The output sink could not be created or written
    SinkError { path: String, message: String },

    /// Configuration errors (invalid settings, etc.)
    ConfigError { message: String },

    /// File I/O errors when reading configuration files
    FileError { path: String, message: String },
}

impl TldWhoisError {
    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new not-found error.
    pub fn not_found<I: Into<String>, M: Into<String>>(identifier: I, marker: M) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
            marker: marker.into(),
        }
    }

    /// Create a new protocol error.
    pub fn protocol<I: Into<String>, M: Into<String>>(identifier: I, message: M) -> Self {
        Self::ProtocolError {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new feed error.
    pub fn feed<L: Into<String>, M: Into<String>>(location: L, message: M) -> Self {
        Self::FeedError {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a new sink error.
    pub fn sink<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::SinkError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Map a per-identifier failure onto the outcome status it produces.
    ///
    /// Timeouts count as network failures. Setup errors never reach a
    /// worker; they are reported as network errors if they ever do.
    pub fn status(&self) -> QueryStatus {
        match self {
            Self::NotFound { .. } => QueryStatus::NotFound,
            Self::ProtocolError { .. } => QueryStatus::ProtocolError,
            Self::NetworkError { .. } | Self::Timeout { .. } => QueryStatus::NetworkError,
            Self::FeedError { .. }
            | Self::SinkError { .. }
            | Self::ConfigError { .. }
            | Self::FileError { .. } => QueryStatus::NetworkError,
        }
    }

    /// Whether this error must abort the whole run.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::FeedError { .. }
                | Self::SinkError { .. }
                | Self::ConfigError { .. }
                | Self::FileError { .. }
        )
    }
}

impl fmt::Display for TldWhoisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::NotFound { identifier, marker } => {
                write!(f, "No '{}' line found for '{}'", marker, identifier)
            }
            Self::ProtocolError {
                identifier,
                message,
            } => {
                write!(f, "Protocol error for '{}': {}", identifier, message)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::FeedError { location, message } => {
                write!(f, "Feed error at '{}': {}", location, message)
            }
            Self::SinkError { path, message } => {
                write!(f, "Output error at '{}': {}", path, message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for TldWhoisError {}

impl From<reqwest::Error> for TldWhoisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("HTTP request", Duration::from_secs(30))
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}
