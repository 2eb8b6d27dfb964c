//! Error handling for DuetScreen
//!
//! Errors are grouped by the layer that raises them:
//! - Transport errors (serial link, HTTP connection, frame buffers)
//! - Protocol errors (HTTP status codes, JSON payloads, remote error codes)
//!
//! Data-level problems (a field missing or of the wrong type) are not errors:
//! decoders leave the snapshot untouched instead. Capacity limits are not
//! errors either: entries beyond a bounded list's capacity are dropped.
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Transport error type
///
/// Raised by the byte channels and frame assemblers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The channel was used before it was opened or configured
    #[error("Remote link not initialized: {link}")]
    NotInitialized {
        /// Which link was not ready ("serial", "http").
        link: String,
    },

    /// Fewer bytes were accepted than requested
    #[error("Write truncated: {written} of {requested} bytes accepted")]
    WriteTruncated {
        /// Bytes the driver accepted.
        written: usize,
        /// Bytes the caller asked to write.
        requested: usize,
    },

    /// No complete frame arrived before the deadline
    #[error("Read timed out after {timeout_ms}ms")]
    ReadTimeout {
        /// The deadline in milliseconds.
        timeout_ms: u64,
    },

    /// The fixed-capacity receive buffer filled up before the frame ended
    #[error("Receive buffer overflow at {capacity} bytes")]
    BufferOverflow {
        /// Capacity of the buffer that overflowed.
        capacity: usize,
    },

    /// Low-level I/O failure
    #[error("I/O error: {reason}")]
    Io {
        /// The reason for the I/O error.
        reason: String,
    },

    /// HTTP client failure (connect, DNS, request timeout)
    #[error("HTTP transport error: {reason}")]
    Http {
        /// The reason for the HTTP error.
        reason: String,
    },
}

/// Protocol error type
///
/// Raised when a response arrived but cannot be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The controller answered with a status code other than 200 or 401
    #[error("Unexpected HTTP status {status} for {path}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
        /// The request path.
        path: String,
    },

    /// The controller requires a (new) session
    #[error("Authentication required for {path}")]
    AuthRequired {
        /// The request path that was refused.
        path: String,
    },

    /// The controller refused the connect request
    #[error("Connect rejected with code {code}")]
    AuthRejected {
        /// The `err` code from `rr_connect`.
        code: i64,
    },

    /// The payload is not valid JSON
    #[error("Malformed JSON: {reason}")]
    MalformedJson {
        /// The parser message.
        reason: String,
    },

    /// The payload carries a non-zero `err` field
    #[error("Remote error code {code}")]
    RemoteError {
        /// The `err` value reported by the controller.
        code: i64,
    },

    /// The payload is valid JSON but not the expected shape
    #[error("Unexpected payload: {reason}")]
    UnexpectedPayload {
        /// What was wrong with the payload.
        reason: String,
    },
}

/// Main error type for DuetScreen
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a read timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Transport(TransportError::ReadTimeout { .. }))
    }

    /// Check if the remote link was never brought up
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, Error::Transport(TransportError::NotInitialized { .. }))
    }

    /// Check if the controller asked for authentication
    pub fn is_auth_required(&self) -> bool {
        matches!(self, Error::Protocol(ProtocolError::AuthRequired { .. }))
    }

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Io(_))
    }

    /// Check if this is a protocol error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::WriteTruncated {
            written: 3,
            requested: 8,
        };
        assert_eq!(err.to_string(), "Write truncated: 3 of 8 bytes accepted");

        let err = TransportError::ReadTimeout { timeout_ms: 15000 };
        assert_eq!(err.to_string(), "Read timed out after 15000ms");
    }

    #[test]
    fn test_error_classification() {
        let err: Error = TransportError::ReadTimeout { timeout_ms: 10 }.into();
        assert!(err.is_timeout());
        assert!(err.is_transport_error());
        assert!(!err.is_not_initialized());

        let err: Error = TransportError::NotInitialized {
            link: "serial".to_string(),
        }
        .into();
        assert!(err.is_not_initialized());
        assert!(!err.is_timeout());

        let err: Error = ProtocolError::AuthRequired {
            path: "/rr_status".to_string(),
        }
        .into();
        assert!(err.is_auth_required());
        assert!(err.is_protocol_error());
    }
}
