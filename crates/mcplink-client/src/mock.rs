//! In-memory transport that plays an MCP server
//!
//! Answers `initialize`, tool, resource and prompt requests from fixtures
//! after a short delay, and records every message the client sends.

use std::sync::Arc;
use std::time::Duration;

use mcplink_protocol::types::{
    ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, Prompt,
    Resource, ResourceTemplate, Tool,
};
use mcplink_protocol::{
    JsonRpcError, JsonRpcErrorResponse, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse,
    LATEST_PROTOCOL_VERSION, RequestId, methods,
};
use mcplink_transport_traits::{
    Transport, TransportError, TransportEventSender, TransportFuture, TransportResult,
    TransportState,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};

/// Delay before each simulated response
pub const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_millis(10);

/// Tools served unless overridden: `mock-tool` taking a string `foo`, and
/// `mock-tool-no-args`.
pub fn default_tools() -> Vec<Tool> {
    vec![
        Tool::new(
            "mock-tool",
            json!({"type": "object", "properties": {"foo": {"type": "string"}}}),
        )
        .with_description("A mock tool for testing"),
        Tool::new("mock-tool-no-args", json!({"type": "object"}))
            .with_description("A mock tool for testing"),
    ]
}

/// Simulated MCP server transport
#[derive(Debug)]
pub struct MockTransport {
    tools: Vec<Tool>,
    resources: Vec<Resource>,
    resource_templates: Vec<ResourceTemplate>,
    prompts: Vec<Prompt>,
    page_size: Option<usize>,
    fail_on_invalid_tool_params: bool,
    initialize_result: Option<Value>,
    send_error_on_start: bool,
    response_delay: Duration,
    shared: Arc<Mutex<Shared>>,
}

#[derive(Debug, Default)]
struct Shared {
    state: TransportState,
    events: Option<TransportEventSender>,
    sent: Vec<JsonRpcMessage>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Mock serving [`default_tools`].
    pub fn new() -> Self {
        Self {
            tools: default_tools(),
            resources: Vec::new(),
            resource_templates: Vec::new(),
            prompts: Vec::new(),
            page_size: None,
            fail_on_invalid_tool_params: false,
            initialize_result: None,
            send_error_on_start: false,
            response_delay: DEFAULT_RESPONSE_DELAY,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    /// Serve `tools` instead of the defaults. An empty list removes the
    /// `tools` capability.
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    /// Serve `resources`
    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self
    }

    /// Serve `templates`
    pub fn with_resource_templates(mut self, templates: Vec<ResourceTemplate>) -> Self {
        self.resource_templates = templates;
        self
    }

    /// Serve `prompts`
    pub fn with_prompts(mut self, prompts: Vec<Prompt>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Split `tools/list` into pages of `size`
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Reject every `tools/call` with `-32602`
    pub fn fail_on_invalid_tool_params(mut self) -> Self {
        self.fail_on_invalid_tool_params = true;
        self
    }

    /// Answer `initialize` with `result`
    pub fn with_initialize_result(mut self, result: Value) -> Self {
        self.initialize_result = Some(result);
        self
    }

    /// Emit an error event right after start
    pub fn send_error_on_start(mut self) -> Self {
        self.send_error_on_start = true;
        self
    }

    /// Set the delay before responses
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Messages the client has sent, in order.
    pub fn sent_messages(&self) -> Vec<JsonRpcMessage> {
        self.shared.lock().sent.clone()
    }

    /// Handle for pushing server messages after the transport is moved
    /// into a client.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn respond(&self, request: &JsonRpcRequest) -> JsonRpcMessage {
        let id = request.id.clone();
        let params = request.params.as_ref();

        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = self
                    .initialize_result
                    .clone()
                    .unwrap_or_else(|| self.default_initialize_result());
                JsonRpcResponse::success(result, id).into()
            }
            methods::TOOLS_LIST => self.list_tools(id, params),
            methods::TOOLS_CALL => self.call_tool(id, params),
            methods::RESOURCES_LIST => success(
                id,
                &ListResourcesResult {
                    resources: self.resources.clone(),
                    next_cursor: None,
                    meta: None,
                },
            ),
            methods::RESOURCES_TEMPLATES_LIST => success(
                id,
                &ListResourceTemplatesResult {
                    resource_templates: self.resource_templates.clone(),
                    next_cursor: None,
                    meta: None,
                },
            ),
            methods::RESOURCES_READ => {
                let uri = string_param(params, "uri");
                match self.resources.iter().find(|r| r.uri == uri) {
                    Some(resource) => {
                        let mut contents = json!({"uri": resource.uri, "text": "Mock resource content"});
                        if let Some(mime_type) = &resource.mime_type {
                            contents["mimeType"] = json!(mime_type);
                        }
                        JsonRpcResponse::success(json!({"contents": [contents]}), id).into()
                    }
                    None => error(id, -32002, format!("Resource not found: {uri}")),
                }
            }
            methods::PROMPTS_LIST => success(
                id,
                &ListPromptsResult {
                    prompts: self.prompts.clone(),
                    next_cursor: None,
                    meta: None,
                },
            ),
            methods::PROMPTS_GET => {
                let name = string_param(params, "name");
                match self.prompts.iter().find(|p| p.name == name) {
                    Some(prompt) => JsonRpcResponse::success(
                        json!({
                            "description": prompt.description,
                            "messages": [{
                                "role": "user",
                                "content": {"type": "text", "text": format!("Mock prompt {name}")},
                            }],
                        }),
                        id,
                    )
                    .into(),
                    None => error(id, -32602, format!("Prompt {name} not found")),
                }
            }
            other => JsonRpcErrorResponse::new(JsonRpcError::method_not_found(other), id).into(),
        }
    }

    fn default_initialize_result(&self) -> Value {
        let mut capabilities = serde_json::Map::new();
        if !self.tools.is_empty() {
            capabilities.insert("tools".into(), json!({}));
        }
        if !self.resources.is_empty() || !self.resource_templates.is_empty() {
            capabilities.insert("resources".into(), json!({}));
        }
        if !self.prompts.is_empty() {
            capabilities.insert("prompts".into(), json!({}));
        }

        json!({
            "protocolVersion": LATEST_PROTOCOL_VERSION,
            "serverInfo": {"name": "mock-mcp-server", "version": "1.0.0"},
            "capabilities": capabilities,
        })
    }

    fn list_tools(&self, id: RequestId, params: Option<&Value>) -> JsonRpcMessage {
        if self.tools.is_empty() {
            return error(id, -32000, "Method not supported".to_string());
        }

        let start: usize = string_param(params, "cursor").parse().unwrap_or(0);
        let end = match self.page_size {
            Some(size) => (start + size).min(self.tools.len()),
            None => self.tools.len(),
        };
        let page = self.tools.get(start..end).unwrap_or_default().to_vec();

        success(
            id,
            &ListToolsResult {
                tools: page,
                next_cursor: (end < self.tools.len()).then(|| end.to_string()),
                meta: None,
            },
        )
    }

    fn call_tool(&self, id: RequestId, params: Option<&Value>) -> JsonRpcMessage {
        let name = string_param(params, "name");
        if !self.tools.iter().any(|t| t.name == name) {
            let available: Vec<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
            return JsonRpcErrorResponse::new(
                JsonRpcError::with_data(
                    -32601,
                    format!("Tool {name} not found"),
                    json!({"availableTools": available, "requestedTool": name}),
                ),
                id,
            )
            .into();
        }

        if self.fail_on_invalid_tool_params {
            return error(id, -32602, format!("Invalid tool inputs for: {name}"));
        }

        JsonRpcResponse::success(
            json!({"content": [{"type": "text", "text": "Mock tool call result"}]}),
            id,
        )
        .into()
    }
}

fn string_param(params: Option<&Value>, key: &str) -> String {
    params
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn success<T: Serialize>(id: RequestId, result: &T) -> JsonRpcMessage {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(value, id).into(),
        Err(e) => JsonRpcErrorResponse::new(JsonRpcError::internal_error(&e.to_string()), id).into(),
    }
}

fn error(id: RequestId, code: i32, message: String) -> JsonRpcMessage {
    JsonRpcErrorResponse::new(JsonRpcError::new(code, message), id).into()
}

/// Pushes server-initiated messages into a started [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MockHandle {
    /// Deliver `message` as if the server had sent it.
    pub async fn inject(&self, message: JsonRpcMessage) {
        let events = self.shared.lock().events.clone();
        if let Some(events) = events {
            events.emit_message(message).await;
        }
    }

    /// Report a transport error.
    pub async fn inject_error(&self, error: TransportError) {
        let events = self.shared.lock().events.clone();
        if let Some(events) = events {
            events.emit_error(error).await;
        }
    }

    /// Simulate the server dropping the connection.
    pub async fn disconnect(&self) {
        let events = {
            let mut shared = self.shared.lock();
            shared.state = TransportState::Closed;
            shared.events.clone()
        };
        if let Some(events) = events {
            events.emit_closed().await;
        }
    }

    /// Messages the client has sent, in order.
    pub fn sent_messages(&self) -> Vec<JsonRpcMessage> {
        self.shared.lock().sent.clone()
    }
}

impl Transport for MockTransport {
    fn start(&self, events: TransportEventSender) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            {
                let mut shared = self.shared.lock();
                if shared.state != TransportState::Idle {
                    return Err(TransportError::AlreadyStarted);
                }
                shared.state = TransportState::Active;
                shared.events = Some(events.clone());
            }

            if self.send_error_on_start {
                events
                    .emit_error(TransportError::Internal("Unknown error".to_string()))
                    .await;
            }
            Ok(())
        })
    }

    fn send(&self, message: JsonRpcMessage) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let events = {
                let mut shared = self.shared.lock();
                if !shared.state.can_send() {
                    return Err(TransportError::NotConnected);
                }
                shared.sent.push(message.clone());
                shared.events.clone()
            };

            if let (JsonRpcMessage::Request(request), Some(events)) = (&message, events) {
                let reply = self.respond(request);
                let delay = self.response_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    events.emit_message(reply).await;
                });
            }
            Ok(())
        })
    }

    fn close(&self) -> TransportFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            let events = {
                let mut shared = self.shared.lock();
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
        self.shared.lock().state
    }
}
