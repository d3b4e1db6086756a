//! Transport error types.

use mcplink_protocol::ProtocolError;
use thiserror::Error;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur during transport operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// The configured endpoint is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// `start` was called on a transport that was already started.
    #[error("Transport already started")]
    AlreadyStarted,

    /// The transport has not finished connecting, or was closed.
    #[error("Not connected")]
    NotConnected,

    /// The remote endpoint answered with a status the operation cannot accept.
    #[error("{message}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Human-readable description including the response body
        message: String,
    },

    /// A response carried a content type the transport cannot decode.
    #[error("Unexpected content type: {0}")]
    UnexpectedContentType(String),

    /// Failed to serialize or deserialize a message.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The inbound stream could not be re-established within the retry budget.
    #[error("Maximum reconnection attempts ({max_retries}) exceeded.")]
    ReconnectExhausted {
        /// Configured retry budget
        max_retries: u32,
    },

    /// The server rejected our credentials and reauthorization did not succeed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The OAuth flow triggered by a 401 failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A protocol-level error occurred.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Status code for [`TransportError::HttpStatus`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for authentication failures.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::AuthenticationFailed(_))
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}

impl From<ProtocolError> for TransportError {
    fn from(err: ProtocolError) -> Self {
        Self::ProtocolError(err.to_string())
    }
}
