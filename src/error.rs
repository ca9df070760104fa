//! Error types for evented TCP sockets.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use evented_tcp::{Result, SocketHandle};
//!
//! fn greet(socket: &SocketHandle) -> Result<()> {
//!     socket.write("hello")?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Usage (synchronous) | [`Error::InvalidState`], [`Error::WriteAfterEnd`], [`Error::InvalidPayloadType`], [`Error::UnknownEncoding`], [`Error::InvalidEncodedData`], [`Error::UnknownEvent`] |
//! | Transport (asynchronous) | [`Error::Transport`], [`Error::ConnectionClosed`] |
//! | External | [`Error::Json`], [`Error::ChannelClosed`] |
//!
//! Nothing in this crate retries. Reconnects and backoff belong to the
//! caller.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::protocol::Encoding;
use crate::socket::ConnectionState;

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
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Usage Errors
    // ========================================================================
    /// Operation not valid in the current connection state.
    ///
    /// Returned by `write` on a disconnected socket and by `connect` on a
    /// socket that is already connecting or connected.
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// State the socket was in.
        state: ConnectionState,
    },

    /// Write issued after `end` or `destroy`.
    #[error("Write after end")]
    WriteAfterEnd,

    /// Payload of an unsupported type.
    ///
    /// Returned when loosely-typed input is neither text nor bytes.
    #[error("Invalid payload: expected a string or byte array, got {type_name}")]
    InvalidPayloadType {
        /// Name of the offending input type.
        type_name: String,
    },

    /// Text encoding name not recognized.
    #[error("Unknown encoding: {encoding}")]
    UnknownEncoding {
        /// The unrecognized encoding name.
        encoding: String,
    },

    /// Text payload is not valid in its declared encoding.
    #[error("Invalid {encoding} data: {message}")]
    InvalidEncodedData {
        /// Declared encoding.
        encoding: Encoding,
        /// Decoder message.
        message: String,
    },

    /// Event name not recognized.
    #[error("Unknown event: {name}")]
    UnknownEvent {
        /// The unrecognized event name.
        name: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Failure reported by the underlying transport.
    ///
    /// Delivered through write completions and `error` events.
    #[error("Transport error: {message}")]
    Transport {
        /// Description reported by the transport.
        message: String,
    },

    /// Connection went away before the operation completed.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(operation: &'static str, state: ConnectionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Creates an invalid payload type error.
    #[inline]
    pub fn invalid_payload_type(type_name: impl Into<String>) -> Self {
        Self::InvalidPayloadType {
            type_name: type_name.into(),
        }
    }

    /// Creates an unknown encoding error.
    #[inline]
    pub fn unknown_encoding(encoding: impl Into<String>) -> Self {
        Self::UnknownEncoding {
            encoding: encoding.into(),
        }
    }

    /// Creates an invalid encoded data error.
    #[inline]
    pub fn invalid_encoded_data(encoding: Encoding, message: impl Into<String>) -> Self {
        Self::InvalidEncodedData {
            encoding,
            message: message.into(),
        }
    }

    /// Creates an unknown event error.
    #[inline]
    pub fn unknown_event(name: impl Into<String>) -> Self {
        Self::UnknownEvent { name: name.into() }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the caller misused the API.
    ///
    /// Usage errors are reported synchronously and never reach the
    /// transport.
    #[inline]
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. }
                | Self::WriteAfterEnd
                | Self::InvalidPayloadType { .. }
                | Self::UnknownEncoding { .. }
                | Self::InvalidEncodedData { .. }
                | Self::UnknownEvent { .. }
        )
    }

    /// Returns `true` if this error came from the transport.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns `true` if the connection is gone.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::ConnectionClosed | Self::ChannelClosed(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_state("write", ConnectionState::Disconnected);
        assert_eq!(
            err.to_string(),
            "Invalid state: cannot write while Disconnected"
        );
    }

    #[test]
    fn test_payload_type_display() {
        let err = Error::invalid_payload_type("object");
        assert_eq!(
            err.to_string(),
            "Invalid payload: expected a string or byte array, got object"
        );
    }

    #[test]
    fn test_is_usage_error() {
        assert!(Error::WriteAfterEnd.is_usage_error());
        assert!(Error::unknown_encoding("utf7").is_usage_error());
        assert!(!Error::transport("reset").is_usage_error());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::transport("reset").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::invalid_payload_type("null").is_connection_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
