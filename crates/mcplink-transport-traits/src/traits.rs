//! Core transport trait.

use std::future::Future;
use std::pin::Pin;

use mcplink_protocol::JsonRpcMessage;

use crate::error::TransportResult;
use crate::events::TransportEventSender;
use crate::types::TransportState;

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A bidirectional channel to one MCP server.
///
/// Outbound traffic goes through [`send`](Transport::send). Everything the
/// server pushes back (responses, server-initiated requests, stream errors)
/// is delivered through the [`TransportEventSender`] given to
/// [`start`](Transport::start), so the transport never holds a reference to
/// its owner.
///
/// Lifecycle: `Idle -> Started -> {Active, Reconnecting} -> Closed`.
/// `start` may be called once. `close` is idempotent and emits
/// [`TransportEvent::Closed`](crate::TransportEvent::Closed) every time it is
/// called.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Starts the transport, delivering inbound events to `events`.
    fn start(&self, events: TransportEventSender) -> TransportFuture<'_, TransportResult<()>>;

    /// Sends a single message.
    fn send(&self, message: JsonRpcMessage) -> TransportFuture<'_, TransportResult<()>>;

    /// Closes the transport and cancels its background work.
    fn close(&self) -> TransportFuture<'_, TransportResult<()>>;

    /// Returns the current lifecycle state.
    fn state(&self) -> TransportState;

    /// Returns the endpoint address for this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}
