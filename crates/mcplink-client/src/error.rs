//! Client error types.

use std::time::Duration;

use mcplink_auth::AuthError;
use mcplink_protocol::{JsonRpcError, ProtocolError};
use mcplink_transport_traits::TransportError;
use serde_json::Value;
use thiserror::Error;

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by [`Client`](crate::Client) operations and reported to
/// the uncaught-error callback.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// OAuth failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The server answered with a JSON-RPC error.
    #[error("{message}")]
    Rpc {
        /// JSON-RPC error code
        code: i32,
        /// Error message
        message: String,
        /// Additional error data
        data: Option<Value>,
    },

    /// The caller cancelled the operation.
    #[error("The operation was aborted")]
    Aborted,

    /// No response arrived within the caller's timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection closed while the request was pending.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The client is closed.
    #[error("Attempted to send a request from a closed client")]
    Closed,

    /// `initialize` has not been called yet.
    #[error("Client is not initialized; call initialize() first")]
    NotInitialized,

    /// `initialize` was called twice.
    #[error("Client is already initialized")]
    AlreadyInitialized,

    /// The server did not advertise the capability the method needs.
    #[error("Server does not support {0}")]
    UnsupportedCapability(String),

    /// The method belongs to no known capability.
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    /// The server negotiated a protocol version this client does not speak.
    #[error("Server's protocol version is not supported: {0}")]
    UnsupportedProtocolVersion(String),

    /// A response arrived for an ID with no pending request.
    #[error("Protocol error: Received a response for an unknown message ID: {0}")]
    UnknownMessageId(String),

    /// A result could not be decoded into the expected type.
    #[error("Failed to parse server response: {0}")]
    Serialization(String),
}

impl Error {
    /// JSON-RPC error code, for [`Error::Rpc`].
    pub fn rpc_code(&self) -> Option<i32> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` when retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::ConnectionClosed => true,
            Self::Transport(e) => matches!(
                e,
                TransportError::ConnectionFailed(_)
                    | TransportError::ConnectionLost(_)
                    | TransportError::ReconnectExhausted { .. }
            ),
            Self::Rpc { code, .. } => *code == -32603,
            _ => false,
        }
    }
}

impl From<JsonRpcError> for Error {
    fn from(error: JsonRpcError) -> Self {
        Self::Rpc {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
