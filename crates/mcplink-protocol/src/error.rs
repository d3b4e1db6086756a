//! Protocol-level error types.

use thiserror::Error;

/// A specialized `Result` type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding protocol messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The payload is not a JSON object.
    #[error("Invalid JSON-RPC message: expected an object")]
    NotAnObject,

    /// The `jsonrpc` member is missing or is not `"2.0"`.
    #[error("Invalid JSON-RPC version: expected '2.0', got '{0}'")]
    InvalidVersion(String),

    /// A message carries an `id` but none of `method`, `result` or `error`.
    #[error("Message with ID must have either 'method', 'result', or 'error'")]
    MissingPayload,

    /// A message carries neither `id` nor `method`.
    #[error("Message must have either 'id' or 'method'")]
    MissingIdOrMethod,

    /// A member has the wrong shape.
    #[error("Invalid JSON-RPC message: {0}")]
    InvalidMessage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
