//! MCP client: handshake, request correlation and capability gating
//!
//! [`Client`] is a cheaply cloneable `Arc` wrapper. All clones share one
//! transport, one pending-request table and one lifecycle:
//!
//! ```text
//! Uninitialized ──initialize()──▶ Initializing ──handshake ok──▶ Ready
//!        │                             │                          │
//!        └────────────── close() / transport closed / failure ────┴──▶ Closed
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use mcplink_protocol::types::{
    CallToolRequestParams, CallToolResult, ClientCapabilities, ElicitationCapability,
    GetPromptRequestParams, GetPromptResult, Implementation, InitializeRequestParams,
    InitializeResult, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, PaginatedRequestParams, ReadResourceRequestParams, ReadResourceResult,
    ServerCapabilities,
};
use mcplink_protocol::{
    JsonRpcNotification, JsonRpcRequest, LATEST_PROTOCOL_VERSION, is_supported_protocol_version,
    methods,
};
use mcplink_transport_traits::{Transport, TransportEventSender};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{ClientConfig, RequestOptions, TransportVariant};
use crate::dispatcher::{ClientState, Dispatcher};
use crate::error::{Error, Result};

struct ClientInner {
    transport: Arc<dyn Transport>,
    dispatcher: Arc<Dispatcher>,
    client_info: Implementation,
    next_id: AtomicI64,
    server: RwLock<Option<InitializeResult>>,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(router) = self.router.lock().take() {
            router.abort();
        }
    }
}

/// MCP client speaking to a single server
///
/// ```rust,no_run
/// use mcplink_client::{Client, ClientConfig, RequestOptions};
/// use mcplink_http::HttpTransportConfig;
///
/// # async fn example() -> mcplink_client::Result<()> {
/// let client = Client::connect(ClientConfig::new(HttpTransportConfig::new(
///     "http://localhost:8080/mcp",
/// )))
/// .await?;
///
/// let tools = client.list_tools(None, &RequestOptions::default()).await?;
/// for tool in tools.tools {
///     println!("{}", tool.name);
/// }
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("client_info", &self.inner.client_info)
            .field("state", &self.state())
            .field("transport", &self.inner.transport)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client without connecting.
    ///
    /// Call [`initialize`](Self::initialize) before issuing requests.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = match config.transport {
            TransportVariant::Config(transport) => transport.build()?,
            TransportVariant::Custom(transport) => transport,
        };
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&transport),
            config.elicitation_handler,
            config.on_uncaught_error,
        ));

        Ok(Self {
            inner: Arc::new(ClientInner {
                transport,
                dispatcher,
                client_info: Implementation::new(config.name, config.version),
                next_id: AtomicI64::new(0),
                server: RwLock::new(None),
                router: Mutex::new(None),
            }),
        })
    }

    /// Create a client and perform the `initialize` handshake.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.initialize().await?;
        Ok(client)
    }

    /// Start the transport and negotiate capabilities with the server.
    ///
    /// Any failure closes the client before the error is returned.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let dispatcher = &self.inner.dispatcher;
        if !dispatcher.transition(ClientState::Uninitialized, ClientState::Initializing) {
            return Err(match dispatcher.state() {
                ClientState::Closed => Error::Closed,
                _ => Error::AlreadyInitialized,
            });
        }

        let result = self.handshake().await;
        if let Err(error) = &result {
            debug!(error = %error, "Initialization failed, closing client");
            let _ = self.close().await;
        }
        result
    }

    async fn handshake(&self) -> Result<InitializeResult> {
        let (events, receiver) = TransportEventSender::channel();
        let router = tokio::spawn(Arc::clone(&self.inner.dispatcher).run(receiver));
        *self.inner.router.lock() = Some(router);

        self.inner.transport.start(events).await?;

        let params = InitializeRequestParams {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities {
                elicitation: self
                    .inner
                    .dispatcher
                    .has_elicitation_handler()
                    .then(ElicitationCapability::default),
                ..ClientCapabilities::default()
            },
            client_info: self.inner.client_info.clone(),
        };
        let result: InitializeResult = self
            .request(
                methods::INITIALIZE,
                Some(serde_json::to_value(params)?),
                &RequestOptions::default(),
            )
            .await?;

        if !is_supported_protocol_version(&result.protocol_version) {
            return Err(Error::UnsupportedProtocolVersion(result.protocol_version));
        }
        *self.inner.server.write() = Some(result.clone());

        self.notify(methods::INITIALIZED, None).await?;

        if !self
            .inner
            .dispatcher
            .transition(ClientState::Initializing, ClientState::Ready)
        {
            return Err(Error::Closed);
        }
        info!(
            server = %result.server_info.name,
            version = %result.protocol_version,
            "MCP client initialized"
        );
        Ok(result)
    }

    /// Close the transport and fail every pending request with
    /// [`Error::ConnectionClosed`]. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.inner.dispatcher.state() == ClientState::Closed {
            return Ok(());
        }
        let result = self.inner.transport.close().await;
        if self.inner.dispatcher.shutdown() {
            info!("MCP client closed");
        }
        result.map_err(Error::from)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ClientState {
        self.inner.dispatcher.state()
    }

    /// Capabilities the server advertised during `initialize`.
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.inner
            .server
            .read()
            .as_ref()
            .map(|s| s.capabilities.clone())
    }

    /// Server name and version.
    pub fn server_info(&self) -> Option<Implementation> {
        self.inner
            .server
            .read()
            .as_ref()
            .map(|s| s.server_info.clone())
    }

    /// Usage instructions the server sent, if any.
    pub fn instructions(&self) -> Option<String> {
        self.inner
            .server
            .read()
            .as_ref()
            .and_then(|s| s.instructions.clone())
    }

    /// Protocol version negotiated with the server.
    pub fn protocol_version(&self) -> Option<String> {
        self.inner
            .server
            .read()
            .as_ref()
            .map(|s| s.protocol_version.clone())
    }

    /// Send a request and decode its result.
    ///
    /// Fails immediately with [`Error::NotInitialized`] before
    /// [`initialize`](Self::initialize) and with [`Error::Closed`] after
    /// [`close`](Self::close). It also fails up front when `options` is
    /// already cancelled or when the server lacks the capability the method
    /// belongs to. Otherwise resolves with the matching response, an
    /// [`Error::ConnectionClosed`] if the connection drops first, or
    /// [`Error::Aborted`] / [`Error::Timeout`] per `options`.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        options: &RequestOptions,
    ) -> Result<R> {
        let value = self.request_value(method, params, options).await?;
        serde_json::from_value(value).map_err(Error::from)
    }

    async fn request_value(
        &self,
        method: &str,
        params: Option<Value>,
        options: &RequestOptions,
    ) -> Result<Value> {
        match self.state() {
            ClientState::Initializing | ClientState::Ready => {}
            ClientState::Uninitialized => return Err(Error::NotInitialized),
            ClientState::Closed => return Err(Error::Closed),
        }
        if options.is_cancelled() {
            return Err(Error::Aborted);
        }
        self.assert_capability(method)?;

        let dispatcher = &self.inner.dispatcher;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let receiver = dispatcher.register(id);

        debug!(id, method, "Sending request");
        let request = JsonRpcRequest::new(method, params, id);
        if let Err(error) = self.inner.transport.send(request.into()).await {
            dispatcher.forget(id);
            return Err(error.into());
        }

        dispatcher.wait(receiver, options).await
    }

    /// Send a notification.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        match self.state() {
            ClientState::Initializing | ClientState::Ready => {}
            ClientState::Uninitialized => return Err(Error::NotInitialized),
            ClientState::Closed => return Err(Error::Closed),
        }
        self.inner
            .transport
            .send(JsonRpcNotification::new(method, params).into())
            .await
            .map_err(Error::from)
    }

    fn assert_capability(&self, method: &str) -> Result<()> {
        if method == methods::INITIALIZE {
            return Ok(());
        }

        let server = self.inner.server.read();
        let capabilities = server.as_ref().map(|s| &s.capabilities);
        let (capability, supported) = match method.split('/').next() {
            Some("tools") => ("tools", capabilities.is_some_and(|c| c.tools.is_some())),
            Some("resources") => (
                "resources",
                capabilities.is_some_and(|c| c.resources.is_some()),
            ),
            Some("prompts") => ("prompts", capabilities.is_some_and(|c| c.prompts.is_some())),
            _ => return Err(Error::UnsupportedMethod(method.to_string())),
        };

        if supported {
            Ok(())
        } else {
            Err(Error::UnsupportedCapability(capability.to_string()))
        }
    }

    /// List one page of tools.
    pub async fn list_tools(
        &self,
        params: Option<PaginatedRequestParams>,
        options: &RequestOptions,
    ) -> Result<ListToolsResult> {
        self.request(methods::TOOLS_LIST, paginated(params)?, options)
            .await
    }

    /// Call a tool.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        options: &RequestOptions,
    ) -> Result<CallToolResult> {
        let params = CallToolRequestParams {
            name: name.to_string(),
            arguments,
            meta: None,
        };
        self.request(
            methods::TOOLS_CALL,
            Some(serde_json::to_value(params)?),
            options,
        )
        .await
    }

    /// List one page of resources.
    pub async fn list_resources(
        &self,
        params: Option<PaginatedRequestParams>,
        options: &RequestOptions,
    ) -> Result<ListResourcesResult> {
        self.request(methods::RESOURCES_LIST, paginated(params)?, options)
            .await
    }

    /// Read a resource by URI.
    pub async fn read_resource(
        &self,
        uri: &str,
        options: &RequestOptions,
    ) -> Result<ReadResourceResult> {
        let params = ReadResourceRequestParams {
            uri: uri.to_string(),
            meta: None,
        };
        self.request(
            methods::RESOURCES_READ,
            Some(serde_json::to_value(params)?),
            options,
        )
        .await
    }

    /// List one page of resource templates.
    pub async fn list_resource_templates(
        &self,
        params: Option<PaginatedRequestParams>,
        options: &RequestOptions,
    ) -> Result<ListResourceTemplatesResult> {
        self.request(methods::RESOURCES_TEMPLATES_LIST, paginated(params)?, options)
            .await
    }

    /// List one page of prompts.
    pub async fn list_prompts(
        &self,
        params: Option<PaginatedRequestParams>,
        options: &RequestOptions,
    ) -> Result<ListPromptsResult> {
        self.request(methods::PROMPTS_LIST, paginated(params)?, options)
            .await
    }

    /// Render a prompt with the given arguments.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
        options: &RequestOptions,
    ) -> Result<GetPromptResult> {
        let params = GetPromptRequestParams {
            name: name.to_string(),
            arguments,
            meta: None,
        };
        self.request(
            methods::PROMPTS_GET,
            Some(serde_json::to_value(params)?),
            options,
        )
        .await
    }
}

fn paginated(params: Option<PaginatedRequestParams>) -> Result<Option<Value>> {
    match params {
        Some(params) if !params.is_empty() => Ok(Some(serde_json::to_value(params)?)),
        _ => Ok(None),
    }
}
