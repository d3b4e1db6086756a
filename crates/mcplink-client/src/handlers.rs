//! Handler traits for server-initiated requests
//!
//! Elicitation is the only request a server sends to the client. Register an
//! [`ElicitationHandler`] through
//! [`ClientConfig::with_elicitation_handler`](crate::ClientConfig::with_elicitation_handler)
//! to answer `elicitation/create`. Without one, the client answers with a
//! `-32601` method-not-found error.
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use mcplink_client::handlers::{ElicitationHandler, HandlerResult};
//! use mcplink_protocol::types::{ElicitRequestParams, ElicitResult};
//! use serde_json::json;
//!
//! #[derive(Debug)]
//! struct AlwaysAccept;
//!
//! #[async_trait]
//! impl ElicitationHandler for AlwaysAccept {
//!     async fn handle_elicitation(&self, request: ElicitRequestParams) -> HandlerResult<ElicitResult> {
//!         println!("Server asks: {}", request.message);
//!         let mut content = serde_json::Map::new();
//!         content.insert("confirmed".into(), json!(true));
//!         Ok(ElicitResult::accept(content))
//!     }
//! }
//! ```

use async_trait::async_trait;
use mcplink_protocol::JsonRpcError;
use mcplink_protocol::types::{ElicitRequestParams, ElicitResult};
use thiserror::Error;

/// Errors a handler can return instead of a result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandlerError {
    /// The user dismissed the request
    #[error("User cancelled the operation")]
    UserCancelled,

    /// The request parameters were unusable
    #[error("Invalid input: {details}")]
    InvalidInput {
        /// What was wrong
        details: String,
    },

    /// Anything else
    #[error("Handler error: {message}")]
    Generic {
        /// Error message
        message: String,
    },
}

impl HandlerError {
    /// JSON-RPC error sent back to the server.
    ///
    /// - `UserCancelled` → `-1`
    /// - `InvalidInput` → `-32602`
    /// - `Generic` → `-32603`
    #[must_use]
    pub fn into_jsonrpc_error(&self) -> JsonRpcError {
        let code = match self {
            Self::UserCancelled => -1,
            Self::InvalidInput { .. } => -32602,
            Self::Generic { .. } => -32603,
        };
        JsonRpcError::new(code, self.to_string())
    }
}

/// Result type for handlers
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Answers `elicitation/create` requests from the server.
#[async_trait]
pub trait ElicitationHandler: Send + Sync + std::fmt::Debug {
    /// Present the request to the user and return their answer.
    async fn handle_elicitation(&self, request: ElicitRequestParams) -> HandlerResult<ElicitResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonrpc_codes() {
        assert_eq!(HandlerError::UserCancelled.into_jsonrpc_error().code, -1);

        let invalid = HandlerError::InvalidInput {
            details: "missing field `name`".into(),
        }
        .into_jsonrpc_error();
        assert_eq!(invalid.code, -32602);
        assert_eq!(invalid.message, "Invalid input: missing field `name`");

        let generic = HandlerError::Generic {
            message: "ui unavailable".into(),
        };
        assert_eq!(generic.into_jsonrpc_error().code, -32603);
    }

    #[derive(Debug)]
    struct Decliner;

    #[async_trait]
    impl ElicitationHandler for Decliner {
        async fn handle_elicitation(&self, request: ElicitRequestParams) -> HandlerResult<ElicitResult> {
            if request.message.is_empty() {
                return Err(HandlerError::InvalidInput {
                    details: "empty message".into(),
                });
            }
            Ok(ElicitResult::decline())
        }
    }

    #[test]
    fn test_handler_object() {
        let handler: std::sync::Arc<dyn ElicitationHandler> = std::sync::Arc::new(Decliner);
        let request = |message: &str| ElicitRequestParams {
            message: message.into(),
            requested_schema: serde_json::json!({"type": "object"}),
            meta: None,
        };

        let answer = tokio_test::block_on(handler.handle_elicitation(request("continue?")));
        assert_eq!(answer, Ok(ElicitResult::decline()));

        let err = tokio_test::block_on(handler.handle_elicitation(request(""))).unwrap_err();
        assert_eq!(err.into_jsonrpc_error().code, -32602);
    }
}
