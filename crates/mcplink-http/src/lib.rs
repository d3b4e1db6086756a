//! # mcplink HTTP Transport
//!
//! HTTP client transports for the Model Context Protocol.
//!
//! ## Features
//!
//! - **Streamable HTTP** ([`HttpTransport`]): POST per message with JSON or
//!   SSE responses, session tracking with `mcp-session-id`, and an inbound
//!   SSE stream resumed with `last-event-id` under exponential backoff
//! - **Legacy HTTP+SSE** ([`SseTransport`]): one SSE stream announcing a POST
//!   endpoint, restricted to the connection's origin
//! - **OAuth**: bearer tokens from an [`OAuthClientProvider`] and a single
//!   reauthorization attempt on `401`
//! - **SSE decoding** ([`sse::SseParser`]): incremental WHATWG event-stream
//!   parser
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mcplink_http::{HttpTransportConfig, TransportConfig};
//! use mcplink_transport_traits::{Transport, TransportEvent, TransportEventSender};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = TransportConfig::from(HttpTransportConfig::new("http://localhost:8080/mcp"))
//!         .build()?;
//!
//!     let (events, mut inbound) = TransportEventSender::channel();
//!     transport.start(events).await?;
//!
//!     while let Some(event) = inbound.recv().await {
//!         if let TransportEvent::Message(message) = event {
//!             println!("{message:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Reconnection
//!
//! When the inbound stream drops, the next attempt waits
//! `min(initial_delay * growth_factor^attempt, max_delay)` (1s, 1.5x, 30s by
//! default). After `max_retries` consecutive failures a
//! [`TransportError::ReconnectExhausted`] event is emitted and the inbound
//! stream stays closed; POSTs keep working.
//!
//! [`OAuthClientProvider`]: mcplink_auth::OAuthClientProvider

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

mod auth;
mod config;
mod legacy;
pub mod sse;
mod streamable;

pub use config::{HttpTransportConfig, ReconnectionOptions, SseTransportConfig, TransportConfig};
pub use legacy::SseTransport;
pub use streamable::{HttpTransport, MCP_PROTOCOL_VERSION, MCP_SESSION_ID};

// Re-export transport traits for convenience
pub use mcplink_transport_traits::{
    Transport, TransportError, TransportEvent, TransportEventSender, TransportResult,
    TransportState,
};
