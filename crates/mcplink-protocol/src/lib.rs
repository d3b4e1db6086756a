//! # mcplink Protocol
//!
//! Wire-level building blocks for the mcplink Model Context Protocol client:
//!
//! - [`jsonrpc`]: the JSON-RPC 2.0 message union with its decoding rules and
//!   request identifiers
//! - [`types`]: MCP payloads exchanged over JSON-RPC (initialize handshake,
//!   tools, resources, prompts, elicitation)
//! - [`methods`]: method name constants
//! - protocol version constants used during capability negotiation
//!
//! ## Decoding
//!
//! ```rust
//! use mcplink_protocol::JsonRpcMessage;
//!
//! let message: JsonRpcMessage =
//!     serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap();
//! assert!(message.is_response());
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod error;
pub mod jsonrpc;
pub mod types;

pub use error::{ProtocolError, Result};
pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcError, JsonRpcErrorCode, JsonRpcErrorResponse, JsonRpcMessage,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JsonRpcVersion, RequestId,
};

/// Latest protocol version this client speaks.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Protocol versions accepted from a server's `initialize` result, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Returns `true` if `version` is one of [`SUPPORTED_PROTOCOL_VERSIONS`].
pub fn is_supported_protocol_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// MCP method names used by the client.
pub mod methods {
    /// Initialize handshake request
    pub const INITIALIZE: &str = "initialize";
    /// Notification completing the handshake
    pub const INITIALIZED: &str = "notifications/initialized";
    /// List available tools
    pub const TOOLS_LIST: &str = "tools/list";
    /// Invoke a tool
    pub const TOOLS_CALL: &str = "tools/call";
    /// List available resources
    pub const RESOURCES_LIST: &str = "resources/list";
    /// Read one resource
    pub const RESOURCES_READ: &str = "resources/read";
    /// List resource templates
    pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
    /// List available prompts
    pub const PROMPTS_LIST: &str = "prompts/list";
    /// Render one prompt
    pub const PROMPTS_GET: &str = "prompts/get";
    /// Server-initiated elicitation request
    pub const ELICITATION_CREATE: &str = "elicitation/create";
}
