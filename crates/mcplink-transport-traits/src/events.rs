//! Inbound transport events.

use mcplink_protocol::JsonRpcMessage;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Channel capacity used by [`TransportEventSender::channel`].
pub const DEFAULT_EVENT_CAPACITY: usize = 500;

/// Something the transport observed that its owner must handle.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A decoded message arrived from the server.
    Message(JsonRpcMessage),
    /// An error occurred with no caller waiting on it (e.g. on the inbound stream).
    Error(TransportError),
    /// The transport was closed.
    Closed,
}

/// Sending half of a transport's inbound event channel.
///
/// Messages are delivered with back-pressure: `emit_message` waits for room
/// in the channel. Every event is delivered at most once. Emitting after the
/// receiver is dropped is a silent no-op.
#[derive(Debug, Clone)]
pub struct TransportEventSender {
    sender: mpsc::Sender<TransportEvent>,
}

impl TransportEventSender {
    /// Creates a sender and its receiver with [`DEFAULT_EVENT_CAPACITY`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<TransportEvent>) {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a sender and its receiver with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Emits an event.
    pub async fn emit(&self, event: TransportEvent) {
        let _ = self.sender.send(event).await;
    }

    /// Emits a `Message` event.
    pub async fn emit_message(&self, message: JsonRpcMessage) {
        self.emit(TransportEvent::Message(message)).await;
    }

    /// Emits an `Error` event.
    pub async fn emit_error(&self, error: TransportError) {
        self.emit(TransportEvent::Error(error)).await;
    }

    /// Emits a `Closed` event.
    pub async fn emit_closed(&self) {
        self.emit(TransportEvent::Closed).await;
    }

    /// Returns `true` once the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
