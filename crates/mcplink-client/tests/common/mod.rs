//! Shared helpers for client integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use mcplink_client::{Client, ClientConfig, Error, TransportVariant};
use mcplink_protocol::{
    JsonRpcErrorResponse, JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse,
    RequestId, methods,
};
use mcplink_transport_traits::{
    Transport, TransportError, TransportEventSender, TransportFuture, TransportResult,
    TransportState,
};
use serde_json::{Value, json};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Collects errors passed to the uncaught-error callback
#[derive(Debug, Clone, Default)]
pub struct ErrorSink(Arc<Mutex<Vec<Error>>>);

impl ErrorSink {
    pub fn install(&self, config: ClientConfig) -> ClientConfig {
        let errors = Arc::clone(&self.0);
        config.with_uncaught_error_handler(move |e| errors.lock().unwrap().push(e))
    }

    pub fn errors(&self) -> Vec<Error> {
        self.0.lock().unwrap().clone()
    }
}

/// Poll `condition` for up to five seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Transport that answers `initialize` by itself and leaves every other
/// request for the test to answer
#[derive(Debug, Clone, Default)]
pub struct ManualTransport {
    shared: Arc<Mutex<ManualShared>>,
}

#[derive(Debug, Default)]
struct ManualShared {
    state: TransportState,
    events: Option<TransportEventSender>,
    sent: Vec<JsonRpcMessage>,
}

impl ManualTransport {
    pub async fn connect(&self) -> Client {
        Client::connect(ClientConfig::new(TransportVariant::custom(self.clone())))
            .await
            .unwrap()
    }

    pub fn sent(&self) -> Vec<JsonRpcMessage> {
        self.shared.lock().unwrap().sent.clone()
    }

    pub fn sent_requests(&self) -> Vec<JsonRpcRequest> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                JsonRpcMessage::Request(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Wait until `count` requests other than `initialize` were sent
    pub async fn wait_for_requests(&self, count: usize) -> Vec<JsonRpcRequest> {
        eventually(|| self.pending_requests().len() >= count).await;
        self.pending_requests()
    }

    fn pending_requests(&self) -> Vec<JsonRpcRequest> {
        self.sent_requests()
            .into_iter()
            .filter(|r| r.method != methods::INITIALIZE)
            .collect()
    }

    pub async fn respond(&self, id: RequestId, result: Value) {
        self.emit(JsonRpcResponse::success(result, id).into()).await;
    }

    pub async fn respond_error(&self, id: RequestId, error: JsonRpcError) {
        self.emit(JsonRpcErrorResponse::new(error, id).into()).await;
    }

    pub async fn emit(&self, message: JsonRpcMessage) {
        let events = self.shared.lock().unwrap().events.clone();
        if let Some(events) = events {
            events.emit_message(message).await;
        }
    }
}

impl Transport for ManualTransport {
    fn start(&self, events: TransportEventSender) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let mut shared = self.shared.lock().unwrap();
            shared.state = TransportState::Active;
            shared.events = Some(events);
            Ok(())
        })
    }

    fn send(&self, message: JsonRpcMessage) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            {
                let mut shared = self.shared.lock().unwrap();
                if !shared.state.can_send() {
                    return Err(TransportError::NotConnected);
                }
                shared.sent.push(message.clone());
            }

            if let JsonRpcMessage::Request(request) = &message
                && request.method == methods::INITIALIZE
            {
                let result = json!({
                    "protocolVersion": "2025-06-18",
                    "serverInfo": {"name": "manual-server", "version": "0.1.0"},
                    "capabilities": {"tools": {}, "resources": {}},
                    "instructions": "Answer by hand",
                });
                self.respond(request.id.clone(), result).await;
            }
            Ok(())
        })
    }

    fn close(&self) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let events = {
                let mut shared = self.shared.lock().unwrap();
                shared.state = TransportState::Closed;
                shared.events.clone()
            };
            if let Some(events) = events {
                events.emit_closed().await;
            }
            Ok(())
        })
    }

    fn state(&self) -> TransportState {
        self.shared.lock().unwrap().state
    }
}
