//! # mcplink Transport Traits
//!
//! Core transport abstractions shared by every mcplink transport and by the
//! client that drives them.
//!
//! ## Overview
//!
//! - **Trait**: [`Transport`] with `start`, `send` and `close`
//! - **Events**: [`TransportEvent`] pushed through a [`TransportEventSender`]
//!   for inbound messages, errors and closure
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **State**: [`TransportState`]
//!
//! ## Usage
//!
//! The owner of a transport creates an event channel, hands the sender to
//! [`Transport::start`] and reads the receiver:
//!
//! ```rust,ignore
//! let (events, mut inbound) = TransportEventSender::channel();
//! transport.start(events).await?;
//! while let Some(event) = inbound.recv().await {
//!     match event {
//!         TransportEvent::Message(msg) => { /* route */ }
//!         TransportEvent::Error(err) => { /* report */ }
//!         TransportEvent::Closed => break,
//!     }
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
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

mod error;
mod events;
mod traits;
mod types;

pub use error::{TransportError, TransportResult};
pub use events::{DEFAULT_EVENT_CAPACITY, TransportEvent, TransportEventSender};
pub use traits::{Transport, TransportFuture};
pub use types::TransportState;
