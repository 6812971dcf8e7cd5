//! Error types for the Daydream client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Daydream client.
///
/// Variants follow the failure taxonomy of a chat turn: transport failures
/// (connection, body read), protocol failures (unexpected payload shape),
/// persistence failures and caller-initiated cancellation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaydreamError {
    /// Connection refused, DNS failure, mid-stream read failure, idle timeout
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status returned by the backend
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Backend answered but the payload did not have the expected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Backend reported an application-level error (`{ "error": ... }`)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON"
        message: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// History load/save error
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The caller aborted the operation. Not a failure.
    #[error("Cancelled")]
    Cancelled,

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DaydreamError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates an Http error
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates a Protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Creates a Backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a transport-level failure (including HTTP status errors)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http { .. })
    }

    /// Check if this error was caused by the caller aborting
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this is a persistence error
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    /// Returns the HTTP status code if this is an `Http` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for DaydreamError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for DaydreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for DaydreamError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<String> for DaydreamError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, DaydreamError>`.
pub type Result<T> = std::result::Result<T, DaydreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = DaydreamError::http(502, "bad gateway");
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
        assert_eq!(err.status(), Some(502));
        assert!(err.is_transport());
    }

    #[test]
    fn test_cancelled_is_not_transport() {
        let err = DaydreamError::Cancelled;
        assert!(err.is_cancelled());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_from_json_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: DaydreamError = parse_err.into();
        assert!(matches!(
            err,
            DaydreamError::Serialization { ref format, .. } if format == "JSON"
        ));
    }
}
