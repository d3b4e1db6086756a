//! Inbound message routing and request correlation
//!
//! The dispatcher is the single consumer of the transport's event channel.
//! A background task reads every [`TransportEvent`] and routes it:
//!
//! - **Responses and error responses** resolve the pending request with the
//!   matching ID
//! - **Requests** (elicitation) are answered on a separate task so a slow
//!   handler never stalls response delivery
//! - **Notifications** are logged
//! - **Errors** go to the uncaught-error callback
//! - **Close** fails every pending request with [`Error::ConnectionClosed`]
//!
//! The dispatcher owns no reference back to the [`Client`](crate::Client), so
//! the routing task never keeps the client alive.

use std::collections::HashMap;
use std::sync::Arc;

use mcplink_protocol::types::ElicitRequestParams;
use mcplink_protocol::{
    JsonRpcError, JsonRpcErrorResponse, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse,
    RequestId, methods,
};
use mcplink_transport_traits::{Transport, TransportEvent};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::config::{RequestOptions, UncaughtErrorHandler};
use crate::error::{Error, Result};
use crate::handlers::ElicitationHandler;

type Waiter = oneshot::Sender<Result<Value>>;

/// Lifecycle of a [`Client`](crate::Client)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// Created, `initialize` not yet called
    #[default]
    Uninitialized,
    /// Handshake in progress
    Initializing,
    /// Handshake complete
    Ready,
    /// Closed; terminal
    Closed,
}

pub(crate) struct Dispatcher {
    transport: Arc<dyn Transport>,
    elicitation_handler: Option<Arc<dyn ElicitationHandler>>,
    on_uncaught_error: Option<UncaughtErrorHandler>,
    state: Mutex<ClientState>,
    pending: Mutex<HashMap<i64, Waiter>>,
}

impl Dispatcher {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        elicitation_handler: Option<Arc<dyn ElicitationHandler>>,
        on_uncaught_error: Option<UncaughtErrorHandler>,
    ) -> Self {
        Self {
            transport,
            elicitation_handler,
            on_uncaught_error,
            state: Mutex::new(ClientState::Uninitialized),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn state(&self) -> ClientState {
        *self.state.lock()
    }

    /// Move from `from` to `to`; fails when the client is elsewhere.
    pub(crate) fn transition(&self, from: ClientState, to: ClientState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    pub(crate) fn has_elicitation_handler(&self) -> bool {
        self.elicitation_handler.is_some()
    }

    /// Register a waiter for `id`. Must happen before the request is sent.
    pub(crate) fn register(&self, id: i64) -> oneshot::Receiver<Result<Value>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        rx
    }

    /// Drop the waiter for a request that was never sent.
    pub(crate) fn forget(&self, id: i64) {
        self.pending.lock().remove(&id);
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Wait for the response to a registered request.
    ///
    /// Cancellation and timeout only resolve this waiter. The table entry
    /// stays until the response arrives or the connection closes.
    pub(crate) async fn wait(
        &self,
        receiver: oneshot::Receiver<Result<Value>>,
        options: &RequestOptions,
    ) -> Result<Value> {
        let cancelled = async {
            match &options.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let deadline = async {
            match options.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let result = tokio::select! {
            result = receiver => result.unwrap_or(Err(Error::ConnectionClosed)),
            () = cancelled => return Err(Error::Aborted),
            () = deadline => return Err(Error::Timeout(options.timeout.unwrap_or_default())),
        };

        if result.is_ok() && options.is_cancelled() {
            return Err(Error::Aborted);
        }
        result
    }

    /// Mark the client closed and fail every pending request once.
    ///
    /// Returns `false` if the client was already closed.
    pub(crate) fn shutdown(&self) -> bool {
        {
            let mut state = self.state.lock();
            if *state == ClientState::Closed {
                return false;
            }
            *state = ClientState::Closed;
        }

        let pending = std::mem::take(&mut *self.pending.lock());
        if !pending.is_empty() {
            debug!("Failing {} pending requests on close", pending.len());
        }
        for waiter in pending.into_values() {
            let _ = waiter.send(Err(Error::ConnectionClosed));
        }
        true
    }

    pub(crate) fn report(&self, error: Error) {
        match &self.on_uncaught_error {
            Some(handler) => handler(error),
            None => warn!(error = %error, "Uncaught MCP client error"),
        }
    }

    /// Route transport events until the channel closes.
    pub(crate) async fn run(self: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message(message) => self.route(message),
                TransportEvent::Error(error) => self.report(error.into()),
                TransportEvent::Closed => {
                    if self.shutdown() {
                        debug!("Transport closed");
                    }
                }
            }
        }
        self.shutdown();
        trace!("Dispatcher stopped");
    }

    fn route(self: &Arc<Self>, message: JsonRpcMessage) {
        match message {
            JsonRpcMessage::Response(response) => {
                let id = response.id.clone();
                self.resolve(&id, Ok(response.result.clone()), || {
                    JsonRpcMessage::Response(response)
                });
            }
            JsonRpcMessage::Error(response) => {
                let id = response.id.clone();
                let error = Error::from(response.error.clone());
                self.resolve(&id, Err(error), || JsonRpcMessage::Error(response));
            }
            JsonRpcMessage::Request(request) => {
                let this = Arc::clone(self);
                tokio::spawn(async move { this.answer(request).await });
            }
            JsonRpcMessage::Notification(notification) => {
                debug!(method = %notification.method, "Ignoring server notification");
            }
        }
    }

    fn resolve(
        &self,
        id: &RequestId,
        result: Result<Value>,
        message: impl FnOnce() -> JsonRpcMessage,
    ) {
        let waiter = id.as_number().and_then(|id| self.pending.lock().remove(&id));

        match waiter {
            Some(waiter) => {
                // The caller may have given up already
                let _ = waiter.send(result);
            }
            None => {
                let json = message()
                    .to_json()
                    .unwrap_or_else(|_| format!("{{\"id\":\"{id}\"}}"));
                warn!("Response for unknown message ID {}", id);
                self.report(Error::UnknownMessageId(json));
            }
        }
    }

    async fn answer(&self, request: JsonRpcRequest) {
        let reply = self.reply_to(&request).await;
        if let Err(error) = self.transport.send(reply).await {
            self.report(error.into());
        }
    }

    async fn reply_to(&self, request: &JsonRpcRequest) -> JsonRpcMessage {
        let id = request.id.clone();
        let handler = match (&self.elicitation_handler, request.method.as_str()) {
            (Some(handler), methods::ELICITATION_CREATE) => handler,
            _ => {
                debug!(method = %request.method, "Rejecting server request");
                return JsonRpcErrorResponse::new(JsonRpcError::method_not_found(&request.method), id)
                    .into();
            }
        };

        let params = request
            .params
            .clone()
            .ok_or_else(|| "missing params".to_string())
            .and_then(|p| {
                serde_json::from_value::<ElicitRequestParams>(p).map_err(|e| e.to_string())
            });
        let params = match params {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcErrorResponse::new(JsonRpcError::invalid_params(e), id).into();
            }
        };

        match handler.handle_elicitation(params).await {
            Ok(result) => match serde_json::to_value(result) {
                Ok(value) => JsonRpcResponse::success(value, id).into(),
                Err(e) => {
                    JsonRpcErrorResponse::new(JsonRpcError::internal_error(&e.to_string()), id)
                        .into()
                }
            },
            Err(e) => JsonRpcErrorResponse::new(e.into_jsonrpc_error(), id).into(),
        }
    }
}
