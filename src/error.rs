//! Error types for the Deribit terminal client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use deribit_terminal::{Endpoint, Result};
//!
//! fn example(endpoint: &Endpoint) -> Result<()> {
//!     let id = endpoint.connect("wss://test.deribit.com/ws/api/v2")?;
//!     endpoint.send(id, r#"{"jsonrpc":"2.0","id":1,"method":"public/test"}"#)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Registry | [`Error::UnknownConnection`], [`Error::NotOpen`] |
//! | Lifecycle | [`Error::HandshakeFailed`], [`Error::RemoteClosed`] |
//! | Waiting | [`Error::ConnectionTimeout`], [`Error::NoReply`] |
//! | Protocol | [`Error::Protocol`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::ConnectionId;
use crate::transport::ConnectionStatus;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Lifecycle failures carry the connection id so callers can still inspect
/// the record through [`crate::Endpoint::metadata`].
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when endpoint options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument supplied by the caller.
    ///
    /// Returned for malformed URIs and unparseable operator commands.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Registry Errors
    // ========================================================================
    /// No connection was ever registered under this id.
    #[error("Unknown connection: {id}")]
    UnknownConnection {
        /// The id that was looked up.
        id: ConnectionId,
    },

    /// The operation requires an open connection.
    #[error("Cannot send, connection {id} not open (status: {status})")]
    NotOpen {
        /// The connection id.
        id: ConnectionId,
        /// Status observed when the operation was attempted.
        status: ConnectionStatus,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// TLS or WebSocket negotiation failed.
    #[error("Connection {id} failed: {reason}")]
    HandshakeFailed {
        /// The connection id.
        id: ConnectionId,
        /// Reason captured from the transport.
        reason: String,
    },

    /// The peer closed the connection.
    #[error("Connection {id} closed by remote: {reason}")]
    RemoteClosed {
        /// The connection id.
        id: ConnectionId,
        /// Close code and reason.
        reason: String,
    },

    // ========================================================================
    // Waiting Errors
    // ========================================================================
    /// The connection did not leave `Connecting` in time.
    ///
    /// The handshake keeps running; a late transition still updates the record.
    #[error("Connection {id} timed out after {timeout_ms}ms")]
    ConnectionTimeout {
        /// The connection id.
        id: ConnectionId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// No inbound message arrived within the wait.
    ///
    /// Not a connection failure.
    #[error("No response received on connection {id} after {timeout_ms}ms")]
    NoReply {
        /// The connection id.
        id: ConnectionId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Unexpected message shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URI parse error.
    #[error("Invalid URI: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an unknown connection error.
    #[inline]
    pub fn unknown_connection(id: ConnectionId) -> Self {
        Self::UnknownConnection { id }
    }

    /// Creates a not-open error.
    #[inline]
    pub fn not_open(id: ConnectionId, status: ConnectionStatus) -> Self {
        Self::NotOpen { id, status }
    }

    /// Creates a handshake failed error.
    #[inline]
    pub fn handshake_failed(id: ConnectionId, reason: impl Into<String>) -> Self {
        Self::HandshakeFailed {
            id,
            reason: reason.into(),
        }
    }

    /// Creates a remote closed error.
    #[inline]
    pub fn remote_closed(id: ConnectionId, reason: impl Into<String>) -> Self {
        Self::RemoteClosed {
            id,
            reason: reason.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(id: ConnectionId, timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { id, timeout_ms }
    }

    /// Creates a no-reply error.
    #[inline]
    pub fn no_reply(id: ConnectionId, timeout_ms: u64) -> Self {
        Self::NoReply { id, timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the connection id this error refers to, if any.
    #[must_use]
    pub fn connection_id(&self) -> Option<ConnectionId> {
        match self {
            Self::UnknownConnection { id }
            | Self::NotOpen { id, .. }
            | Self::HandshakeFailed { id, .. }
            | Self::RemoteClosed { id, .. }
            | Self::ConnectionTimeout { id, .. }
            | Self::NoReply { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::NoReply { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::HandshakeFailed { .. }
                | Self::RemoteClosed { .. }
                | Self::ConnectionTimeout { .. }
                | Self::NotOpen { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the same call may succeed later.
    ///
    /// A connection that is still `Connecting` may open; an unknown id never
    /// becomes known.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotOpen { status, .. } => *status == ConnectionStatus::Connecting,
            Self::ConnectionTimeout { .. } | Self::NoReply { .. } => true,
            _ => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::handshake_failed(ConnectionId::new(1), "handshake error");
        assert_eq!(err.to_string(), "Connection 1 failed: handshake error");
    }

    #[test]
    fn test_not_open_display() {
        let err = Error::not_open(ConnectionId::new(3), ConnectionStatus::Closed);
        assert_eq!(
            err.to_string(),
            "Cannot send, connection 3 not open (status: Closed)"
        );
    }

    #[test]
    fn test_no_reply_display() {
        let err = Error::no_reply(ConnectionId::new(0), 250);
        assert_eq!(
            err.to_string(),
            "No response received on connection 0 after 250ms"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::connection_timeout(ConnectionId::new(0), 5000);
        let reply_err = Error::no_reply(ConnectionId::new(0), 5000);
        let other_err = Error::unknown_connection(ConnectionId::new(0));

        assert!(timeout_err.is_timeout());
        assert!(reply_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_no_reply_is_not_connection_error() {
        let reply_err = Error::no_reply(ConnectionId::new(0), 100);
        let failed = Error::handshake_failed(ConnectionId::new(0), "tls");

        assert!(!reply_err.is_connection_error());
        assert!(failed.is_connection_error());
    }

    #[test]
    fn test_is_retryable() {
        let connecting = Error::not_open(ConnectionId::new(0), ConnectionStatus::Connecting);
        let closed = Error::not_open(ConnectionId::new(0), ConnectionStatus::Closed);
        let unknown = Error::unknown_connection(ConnectionId::new(99));

        assert!(connecting.is_retryable());
        assert!(!closed.is_retryable());
        assert!(!unknown.is_retryable());
    }

    #[test]
    fn test_connection_id() {
        let err = Error::remote_closed(ConnectionId::new(7), "1000 bye");
        assert_eq!(err.connection_id(), Some(ConnectionId::new(7)));
        assert_eq!(Error::config("x").connection_id(), None);
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a uri").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::Url(_)));
    }
}
