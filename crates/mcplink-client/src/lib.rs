//! # mcplink Client
//!
//! Model Context Protocol client for a single server.
//!
//! ## Features
//!
//! - **Handshake**: `initialize` with protocol version validation and the
//!   `notifications/initialized` follow-up
//! - **Correlation**: integer request IDs from one counter, one waiter per
//!   ID, per-request cancellation and timeout via [`RequestOptions`]
//! - **Capability gating**: `tools/*`, `resources/*` and `prompts/*` require
//!   the matching server capability
//! - **Elicitation**: server-initiated `elicitation/create` answered by an
//!   [`ElicitationHandler`](handlers::ElicitationHandler), or rejected with
//!   `-32601`
//! - **Tools**: [`Client::tools`] wraps every server tool as an [`McpTool`]
//!   with a normalized input schema
//! - **Transports**: streamable HTTP or legacy SSE from configuration, or any
//!   [`Transport`] implementation, including the in-memory
//!   [`MockTransport`](mock::MockTransport)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mcplink_client::{Client, ClientConfig, RequestOptions, ToolSchemas};
//! use mcplink_http::HttpTransportConfig;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new(HttpTransportConfig::new("http://localhost:8080/mcp"))
//!         .with_name("my-agent")
//!         .with_uncaught_error_handler(|e| eprintln!("mcp: {e}"));
//!     let client = Client::connect(config).await?;
//!
//!     let options = RequestOptions::default();
//!     let tools = client.tools(&ToolSchemas::Automatic, &options).await?;
//!     if let Some(weather) = tools.get("get_weather") {
//!         let output = weather.execute(json!({"city": "Lisbon"}), &options).await?;
//!         println!("{}", output.into_value());
//!     }
//!
//!     client.close().await?;
//!     Ok(())
//! }
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

mod client;
mod config;
mod dispatcher;
mod error;
pub mod handlers;
pub mod mock;
mod tools;

pub use client::Client;
pub use config::{
    ClientConfig, DEFAULT_CLIENT_NAME, DEFAULT_CLIENT_VERSION, RequestOptions, TransportVariant,
    UncaughtErrorHandler,
};
pub use dispatcher::ClientState;
pub use error::{Error, Result};
pub use tools::{McpTool, ToolOutput, ToolSchemas, normalize_input_schema};

pub use mcplink_transport_traits::Transport;
pub use tokio_util::sync::CancellationToken;
