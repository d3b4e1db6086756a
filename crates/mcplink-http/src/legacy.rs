//! Legacy HTTP+SSE client transport (MCP 2024-11-05).
//!
//! A GET opens one long-lived SSE stream. Its first `endpoint` event names the
//! URL that outbound messages are POSTed to; `message` events carry the
//! server's messages. There is no reconnection: when the stream ends the
//! transport reports an error and stays disconnected.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use mcplink_protocol::JsonRpcMessage;
use mcplink_transport_traits::{
    Transport, TransportError, TransportEventSender, TransportFuture, TransportResult,
    TransportState,
};
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{Authorizer, header_map};
use crate::config::SseTransportConfig;
use crate::sse::SseParser;

/// MCP legacy SSE client transport.
pub struct SseTransport {
    inner: Arc<Inner>,
}

struct Inner {
    url: Url,
    headers: HeaderMap,
    authorizer: Option<Authorizer>,
    http: reqwest::Client,
    shared: Mutex<Shared>,
}

#[derive(Default)]
struct Shared {
    state: TransportState,
    events: Option<TransportEventSender>,
    endpoint: Option<Url>,
    stream_task: Option<JoinHandle<()>>,
}

type Ready = Option<oneshot::Sender<TransportResult<()>>>;

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("SseTransport")
            .field("url", &self.inner.url.as_str())
            .field("endpoint", &shared.endpoint.as_ref().map(Url::as_str))
            .field("state", &shared.state)
            .finish()
    }
}

impl SseTransport {
    /// Create a transport for `config`.
    pub fn new(config: SseTransportConfig) -> TransportResult<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", config.url)))?;
        let authorizer = config.auth_provider.map(Authorizer::new).transpose()?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                url,
                headers: header_map(&config.headers),
                authorizer,
                http,
                shared: Mutex::new(Shared::default()),
            }),
        })
    }

    /// POST endpoint announced by the server.
    pub fn message_endpoint(&self) -> Option<Url> {
        self.inner.shared.lock().endpoint.clone()
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Some(task) = self.inner.shared.lock().stream_task.take() {
            task.abort();
        }
    }
}

impl Inner {
    fn events(&self) -> Option<TransportEventSender> {
        self.shared.lock().events.clone()
    }

    async fn emit_error(&self, error: TransportError) {
        if let Some(events) = self.events() {
            events.emit_error(error).await;
        }
    }

    async fn request_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(authorizer) = &self.authorizer {
            authorizer.apply(&mut headers).await;
        }
        headers
    }

    async fn run_stream(self: Arc<Self>, ready: oneshot::Sender<TransportResult<()>>) {
        let mut ready: Ready = Some(ready);
        let result = self.read_stream(&mut ready).await;

        let error = match result {
            Ok(()) => TransportError::ConnectionLost("SSE stream ended".to_string()),
            Err(e) => e,
        };

        let closed = {
            let mut shared = self.shared.lock();
            shared.endpoint = None;
            shared.state == TransportState::Closed
        };
        if closed {
            return;
        }

        match ready.take() {
            Some(ready) => {
                let _ = ready.send(Err(error.clone()));
            }
            None => {
                let mut shared = self.shared.lock();
                shared.state = TransportState::Started;
            }
        }
        self.emit_error(error).await;
    }

    async fn read_stream(&self, ready: &mut Ready) -> TransportResult<()> {
        let mut tried_auth = false;

        let response = loop {
            let mut headers = self.request_headers().await;
            headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));

            let response = self
                .http
                .get(self.url.clone())
                .headers(headers)
                .send()
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            if response.status() == StatusCode::UNAUTHORIZED
                && let Some(authorizer) = &self.authorizer
            {
                if tried_auth {
                    return Err(TransportError::Unauthorized(
                        "server rejected the refreshed credentials".to_string(),
                    ));
                }
                authorizer
                    .reauthorize(&self.url, response.headers())
                    .await?;
                tried_auth = true;
                continue;
            }

            if response.status() != StatusCode::OK {
                let status = response.status();
                return Err(TransportError::HttpStatus {
                    status: status.as_u16(),
                    message: format!("SSE connection failed: {status}"),
                });
            }
            break response;
        };

        let mut parser = SseParser::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk: Bytes = chunk.map_err(|e| TransportError::ConnectionLost(e.to_string()))?;
            for event in parser.feed(&chunk) {
                match event.event_type() {
                    "endpoint" => {
                        let endpoint = self.resolve_endpoint(&event.data)?;
                        info!("SSE transport connected, posting to {}", endpoint);
                        {
                            let mut shared = self.shared.lock();
                            shared.endpoint = Some(endpoint);
                            if shared.state != TransportState::Closed {
                                shared.state = TransportState::Active;
                            }
                        }
                        if let Some(ready) = ready.take() {
                            let _ = ready.send(Ok(()));
                        }
                    }
                    "message" => match JsonRpcMessage::from_json(&event.data) {
                        Ok(message) => {
                            if let Some(events) = self.events() {
                                events.emit_message(message).await;
                            }
                        }
                        Err(e) => {
                            self.emit_error(TransportError::SerializationFailed(format!(
                                "Failed to parse message: {e}"
                            )))
                            .await;
                        }
                    },
                    other => debug!("Ignoring SSE event type {}", other),
                }
            }
        }

        parser.finish();
        if self.shared.lock().endpoint.is_some() {
            return Err(TransportError::ConnectionLost(
                "Connection closed unexpectedly".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the `endpoint` event against the connection URL and require
    /// the same origin.
    fn resolve_endpoint(&self, data: &str) -> TransportResult<Url> {
        let endpoint = self
            .url
            .join(data.trim())
            .map_err(|e| TransportError::InvalidUrl(format!("Invalid endpoint URL {data}: {e}")))?;

        if endpoint.origin() != self.url.origin() {
            return Err(TransportError::ConnectionFailed(format!(
                "Endpoint origin does not match connection origin: {}",
                endpoint.origin().ascii_serialization()
            )));
        }
        Ok(endpoint)
    }

    async fn post(&self, endpoint: &Url, body: String) -> TransportResult<()> {
        let mut tried_auth = false;

        loop {
            let mut headers = self.request_headers().await;
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );

            let response = self
                .http
                .post(endpoint.clone())
                .headers(headers)
                .body(body.clone())
                .send()
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED
                && let Some(authorizer) = &self.authorizer
            {
                if tried_auth {
                    return Err(TransportError::Unauthorized(
                        "server rejected the refreshed credentials".to_string(),
                    ));
                }
                authorizer.reauthorize(&self.url, response.headers()).await?;
                tried_auth = true;
                continue;
            }

            if status != StatusCode::OK && status != StatusCode::CREATED {
                let text = response.text().await.unwrap_or_default();
                return Err(TransportError::HttpStatus {
                    status: status.as_u16(),
                    message: format!("POSTing to endpoint (HTTP {}): {}", status.as_u16(), text),
                });
            }
            return Ok(());
        }
    }
}

impl Transport for SseTransport {
    fn start(&self, events: TransportEventSender) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            {
                let mut shared = self.inner.shared.lock();
                if shared.state != TransportState::Idle {
                    return Err(TransportError::AlreadyStarted);
                }
                shared.state = TransportState::Started;
                shared.events = Some(events);
            }

            info!("Connecting SSE transport to {}", self.inner.url);
            let (ready_tx, ready_rx) = oneshot::channel();
            let task = tokio::spawn(Arc::clone(&self.inner).run_stream(ready_tx));
            self.inner.shared.lock().stream_task = Some(task);

            match ready_rx.await {
                Ok(result) => result,
                Err(_) => Err(TransportError::ConnectionLost(
                    "SSE stream closed before the endpoint event".to_string(),
                )),
            }
        })
    }

    fn send(&self, message: JsonRpcMessage) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let endpoint = {
                let shared = self.inner.shared.lock();
                shared.endpoint.clone().filter(|_| shared.state.can_send())
            };
            let Some(endpoint) = endpoint else {
                return Err(TransportError::NotConnected);
            };

            let result = match message.to_json() {
                Ok(body) => self.inner.post(&endpoint, body).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = &result {
                warn!(error = %e, "SSE send failed");
                self.inner.emit_error(e.clone()).await;
            }
            result
        })
    }

    fn close(&self) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let task = {
                let mut shared = self.inner.shared.lock();
                shared.state = TransportState::Closed;
                shared.endpoint = None;
                shared.stream_task.take()
            };
            if let Some(task) = task {
                task.abort();
                info!("SSE transport closed");
            }

            if let Some(events) = self.inner.events() {
                events.emit_closed().await;
            }
            Ok(())
        })
    }

    fn state(&self) -> TransportState {
        self.inner.shared.lock().state
    }

    fn endpoint(&self) -> Option<String> {
        Some(self.inner.url.to_string())
    }
}
