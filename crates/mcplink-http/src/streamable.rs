//! Streamable HTTP client transport.
//!
//! - Every outbound message is a POST to the single MCP endpoint
//! - The server answers with JSON, an SSE stream, or `202 Accepted`
//! - An optional GET-initiated SSE stream carries server-initiated messages,
//!   resumed with `last-event-id` after it drops
//! - `mcp-session-id` is captured from any response and echoed on every
//!   request; the session is terminated with DELETE on close
//! - `401` runs the OAuth flow once and replays the request

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use mcplink_protocol::{JsonRpcMessage, LATEST_PROTOCOL_VERSION};
use mcplink_transport_traits::{
    Transport, TransportError, TransportEventSender, TransportFuture, TransportResult,
    TransportState,
};
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{Authorizer, header_map};
use crate::config::{HttpTransportConfig, ReconnectionOptions};
use crate::sse::SseParser;

/// Session header issued by the server and echoed by the client.
pub const MCP_SESSION_ID: &str = "mcp-session-id";
/// Protocol version header sent with every request.
pub const MCP_PROTOCOL_VERSION: &str = "mcp-protocol-version";
const LAST_EVENT_ID: &str = "last-event-id";

const ACCEPT_POST: &str = "application/json, text/event-stream";
const ACCEPT_SSE: &str = "text/event-stream";

/// MCP Streamable HTTP client transport.
pub struct HttpTransport {
    inner: Arc<Inner>,
}

struct Inner {
    url: Url,
    headers: HeaderMap,
    authorizer: Option<Authorizer>,
    reconnection: ReconnectionOptions,
    request_timeout: Option<Duration>,
    http: reqwest::Client,
    shared: Mutex<Shared>,
}

#[derive(Default)]
struct Shared {
    state: TransportState,
    events: Option<TransportEventSender>,
    session_id: Option<String>,
    last_event_id: Option<String>,
    inbound_active: bool,
    reconnect_attempts: u32,
    inbound_task: Option<JoinHandle<()>>,
    stream_tasks: Vec<JoinHandle<()>>,
}

/// How one inbound GET ended.
enum Inbound {
    /// Server has no inbound stream (404/405)
    Unsupported,
    /// Tokens were refreshed, retry immediately
    Reauthorized,
    /// Stream failed or ended; reconnect with backoff
    Dropped,
    /// Give up without reconnecting
    Stopped,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("HttpTransport")
            .field("url", &self.inner.url.as_str())
            .field("state", &shared.state)
            .field("session_id", &shared.session_id)
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport for `config`. Nothing is sent until
    /// [`start`](Transport::start).
    pub fn new(config: HttpTransportConfig) -> TransportResult<Self> {
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
                reconnection: config.reconnection,
                request_timeout: config.request_timeout,
                http,
                shared: Mutex::new(Shared::default()),
            }),
        })
    }

    /// Session id issued by the server, if any.
    pub fn session_id(&self) -> Option<String> {
        self.inner.shared.lock().session_id.clone()
    }

    /// Id of the last event received on the inbound stream.
    pub fn last_event_id(&self) -> Option<String> {
        self.inner.shared.lock().last_event_id.clone()
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        let mut shared = self.inner.shared.lock();
        if let Some(task) = shared.inbound_task.take() {
            task.abort();
        }
        for task in shared.stream_tasks.drain(..) {
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

    async fn emit_message(&self, message: JsonRpcMessage) {
        if let Some(events) = self.events() {
            events.emit_message(message).await;
        }
    }

    fn is_closed(&self) -> bool {
        self.shared.lock().state == TransportState::Closed
    }

    /// Headers shared by every request: user headers, protocol version,
    /// session id and bearer token.
    async fn common_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.insert(
            MCP_PROTOCOL_VERSION,
            HeaderValue::from_static(LATEST_PROTOCOL_VERSION),
        );

        let session_id = self.shared.lock().session_id.clone();
        if let Some(session_id) = session_id
            && let Ok(value) = HeaderValue::from_str(&session_id)
        {
            headers.insert(MCP_SESSION_ID, value);
        }

        if let Some(authorizer) = &self.authorizer {
            authorizer.apply(&mut headers).await;
        }

        headers
    }

    fn capture_session_id(&self, response: &reqwest::Response) {
        if let Some(session_id) = response
            .headers()
            .get(MCP_SESSION_ID)
            .and_then(|v| v.to_str().ok())
        {
            let mut shared = self.shared.lock();
            if shared.session_id.as_deref() != Some(session_id) {
                info!("Received session ID: {}", session_id);
                shared.session_id = Some(session_id.to_string());
            }
        }
    }

    async fn send_message(self: &Arc<Self>, message: &JsonRpcMessage) -> TransportResult<()> {
        if !self.shared.lock().state.can_send() {
            return Err(TransportError::NotConnected);
        }

        let body = message.to_json()?;
        let mut tried_auth = false;

        loop {
            let mut headers = self.common_headers().await;
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_POST));

            let mut request = self
                .http
                .post(self.url.clone())
                .headers(headers)
                .body(body.clone());
            if let Some(timeout) = self.request_timeout {
                request = request.timeout(timeout);
            }

            let response = request
                .send()
                .await
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
            self.capture_session_id(&response);

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

            return self.handle_post_response(message, response).await;
        }
    }

    async fn handle_post_response(
        self: &Arc<Self>,
        message: &JsonRpcMessage,
        response: reqwest::Response,
    ) -> TransportResult<()> {
        let status = response.status();

        if status == StatusCode::ACCEPTED {
            debug!("Received HTTP 202 Accepted");
            let _ = response.bytes().await;
            if !self.shared.lock().inbound_active {
                self.open_inbound();
            }
            return Ok(());
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let mut message = format!(
                "POSTing to endpoint (HTTP {}): {}",
                status.as_u16(),
                text
            );
            if status == StatusCode::NOT_FOUND {
                message.push_str(
                    ". This server does not support HTTP transport. Try using `sse` transport instead",
                );
            }
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        if message.is_notification() {
            return Ok(());
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("application/json") {
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::ConnectionLost(e.to_string()))?;
            let messages = match serde_json::from_slice::<Value>(&body)? {
                Value::Array(items) => items,
                single => vec![single],
            };
            for item in messages {
                self.emit_message(JsonRpcMessage::from_value(item)?).await;
            }
            return Ok(());
        }

        if content_type.contains("text/event-stream") {
            debug!("Received SSE stream response from POST");
            let inner = Arc::clone(self);
            let task = tokio::spawn(async move {
                if let Err(e) = inner.read_event_stream(response, false).await {
                    inner.emit_error(e).await;
                }
            });

            let mut shared = self.shared.lock();
            if shared.state == TransportState::Closed {
                task.abort();
            } else {
                shared.stream_tasks.retain(|t| !t.is_finished());
                shared.stream_tasks.push(task);
            }
            return Ok(());
        }

        Err(TransportError::UnexpectedContentType(content_type))
    }

    /// Decode SSE from `response`, dispatching `message` events. With
    /// `track_ids`, event ids become the resumption token.
    async fn read_event_stream(
        &self,
        response: reqwest::Response,
        track_ids: bool,
    ) -> TransportResult<()> {
        let mut parser = SseParser::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk: Bytes = chunk.map_err(|e| TransportError::ConnectionLost(e.to_string()))?;
            for event in parser.feed(&chunk) {
                if track_ids && let Some(id) = &event.id {
                    self.shared.lock().last_event_id = Some(id.clone());
                }
                if event.is_message() {
                    self.dispatch(&event.data).await;
                }
            }
        }

        parser.finish();
        Ok(())
    }

    async fn dispatch(&self, data: &str) {
        match JsonRpcMessage::from_json(data) {
            Ok(message) => self.emit_message(message).await,
            Err(e) => {
                self.emit_error(TransportError::SerializationFailed(format!(
                    "Failed to parse message: {e}"
                )))
                .await;
            }
        }
    }

    /// (Re)open the inbound stream, replacing any previous attempt.
    fn open_inbound(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let mut shared = self.shared.lock();
        if shared.state == TransportState::Closed {
            return;
        }
        if let Some(previous) = shared.inbound_task.take() {
            previous.abort();
        }
        shared.inbound_task = Some(tokio::spawn(inner.inbound_loop()));
    }

    async fn inbound_loop(self: Arc<Self>) {
        let mut tried_auth = false;

        loop {
            match self.inbound_once(tried_auth).await {
                Inbound::Unsupported | Inbound::Stopped => return,
                Inbound::Reauthorized => tried_auth = true,
                Inbound::Dropped => {
                    tried_auth = false;

                    let delay = {
                        let mut shared = self.shared.lock();
                        if shared.state == TransportState::Closed {
                            return;
                        }
                        if self.reconnection.is_exhausted(shared.reconnect_attempts) {
                            shared.state = TransportState::Started;
                            None
                        } else {
                            let delay = self.reconnection.delay(shared.reconnect_attempts);
                            shared.reconnect_attempts += 1;
                            shared.state = TransportState::Reconnecting;
                            Some((delay, shared.reconnect_attempts))
                        }
                    };

                    let Some((delay, attempt)) = delay else {
                        warn!("Giving up on the inbound SSE stream");
                        self.emit_error(TransportError::ReconnectExhausted {
                            max_retries: self.reconnection.max_retries,
                        })
                        .await;
                        return;
                    };

                    info!("Reconnecting inbound SSE stream in {:?} (attempt {})", delay, attempt);
                    tokio::time::sleep(delay).await;
                    if self.is_closed() {
                        return;
                    }
                }
            }
        }
    }

    async fn inbound_once(&self, tried_auth: bool) -> Inbound {
        let mut headers = self.common_headers().await;
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_SSE));
        let resume = self.shared.lock().last_event_id.clone();
        if let Some(resume) = resume
            && let Ok(value) = HeaderValue::from_str(&resume)
        {
            headers.insert(LAST_EVENT_ID, value);
        }

        let response = match self.http.get(self.url.clone()).headers(headers).send().await {
            Ok(response) => response,
            Err(e) => {
                self.emit_error(TransportError::ConnectionFailed(e.to_string()))
                    .await;
                return Inbound::Dropped;
            }
        };
        self.capture_session_id(&response);
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let error = match &self.authorizer {
                Some(authorizer) if !tried_auth => {
                    match authorizer.reauthorize(&self.url, response.headers()).await {
                        Ok(()) => return Inbound::Reauthorized,
                        Err(e) => e,
                    }
                }
                _ => TransportError::Unauthorized(format!("GET SSE failed: {status}")),
            };
            self.emit_error(error).await;
            return Inbound::Stopped;
        }

        if status == StatusCode::NOT_FOUND || status == StatusCode::METHOD_NOT_ALLOWED {
            debug!("Server does not offer an inbound SSE stream ({})", status);
            return Inbound::Unsupported;
        }

        if !status.is_success() {
            self.emit_error(TransportError::HttpStatus {
                status: status.as_u16(),
                message: format!("GET SSE failed: {status}"),
            })
            .await;
            return Inbound::Dropped;
        }

        {
            let mut shared = self.shared.lock();
            shared.inbound_active = true;
            shared.reconnect_attempts = 0;
            if shared.state != TransportState::Closed {
                shared.state = TransportState::Active;
            }
        }
        info!("Inbound SSE stream established");

        let result = self.read_event_stream(response, true).await;

        {
            let mut shared = self.shared.lock();
            shared.inbound_active = false;
            if shared.state == TransportState::Active {
                shared.state = TransportState::Started;
            }
        }
        if let Err(e) = result {
            self.emit_error(e).await;
        }

        if self.is_closed() {
            Inbound::Stopped
        } else {
            warn!("Inbound SSE stream ended");
            Inbound::Dropped
        }
    }
}

impl Transport for HttpTransport {
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

            info!("Starting streamable HTTP transport for {}", self.inner.url);
            self.inner.open_inbound();
            tokio::task::yield_now().await;
            Ok(())
        })
    }

    fn send(&self, message: JsonRpcMessage) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let result = self.inner.send_message(&message).await;
            if let Err(e) = &result {
                warn!(error = %e, "HTTP send failed");
                self.inner.emit_error(e.clone()).await;
            }
            result
        })
    }

    fn close(&self) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let (already_closed, tasks, session_id) = {
                let mut shared = self.inner.shared.lock();
                let already_closed = shared.state == TransportState::Closed;
                shared.state = TransportState::Closed;
                shared.inbound_active = false;
                let mut tasks: Vec<_> = shared.stream_tasks.drain(..).collect();
                tasks.extend(shared.inbound_task.take());
                (already_closed, tasks, shared.session_id.clone())
            };

            for task in tasks {
                task.abort();
            }

            if !already_closed {
                if let Some(session_id) = session_id {
                    let headers = self.inner.common_headers().await;
                    match self
                        .inner
                        .http
                        .delete(self.inner.url.clone())
                        .headers(headers)
                        .send()
                        .await
                    {
                        Ok(response) => {
                            debug!(status = %response.status(), "Terminated session {}", session_id);
                        }
                        Err(e) => debug!(error = %e, "Failed to terminate session"),
                    }
                }
                info!("Streamable HTTP transport closed");
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
