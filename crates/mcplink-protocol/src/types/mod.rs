//! MCP Protocol Types Module
//!
//! Payloads carried inside JSON-RPC `params` and `result` members, organized
//! by protocol area.
//!
//! - [`initialization`] - Connection handshake and capability negotiation
//! - [`content`] - Message content types (text, image, audio, resources)
//! - [`tools`] - Tool listing and calling
//! - [`resources`] - Resource access and templates
//! - [`prompts`] - Prompt templates
//! - [`elicitation`] - Server-initiated user input requests

pub mod content;
pub mod elicitation;
pub mod initialization;
pub mod prompts;
pub mod resources;
pub mod tools;

pub use content::*;
pub use elicitation::*;
pub use initialization::*;
pub use prompts::*;
pub use resources::*;
pub use tools::*;

use serde::{Deserialize, Serialize};

/// Free-form `_meta` object attached to requests and results.
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// Parameters shared by every paginated list request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginatedRequestParams {
    /// Opaque cursor returned as `nextCursor` by a previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    /// Request metadata
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl PaginatedRequestParams {
    /// Parameters for the page after `cursor`.
    pub fn with_cursor(cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            meta: None,
        }
    }

    /// Returns `true` when nothing would be sent.
    pub fn is_empty(&self) -> bool {
        self.cursor.is_none() && self.meta.is_none()
    }
}
