//! Client configuration types

use std::sync::Arc;
use std::time::Duration;

use mcplink_http::{HttpTransportConfig, SseTransportConfig, TransportConfig};
use mcplink_transport_traits::Transport;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::handlers::ElicitationHandler;

/// Default client name sent in `clientInfo`
pub const DEFAULT_CLIENT_NAME: &str = "mcplink-client";

/// Default client version sent in `clientInfo`
pub const DEFAULT_CLIENT_VERSION: &str = "1.0.0";

/// Callback for errors no caller is waiting on
pub type UncaughtErrorHandler = Arc<dyn Fn(Error) + Send + Sync>;

/// Where the client's transport comes from
#[derive(Clone)]
pub enum TransportVariant {
    /// Build one of the HTTP transports from configuration
    Config(TransportConfig),
    /// Use a caller-supplied transport
    Custom(Arc<dyn Transport>),
}

impl TransportVariant {
    /// Wrap a caller-supplied transport.
    pub fn custom(transport: impl Transport + 'static) -> Self {
        Self::Custom(Arc::new(transport))
    }
}

impl std::fmt::Debug for TransportVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(config) => f.debug_tuple("Config").field(config).finish(),
            Self::Custom(transport) => f.debug_tuple("Custom").field(transport).finish(),
        }
    }
}

impl From<TransportConfig> for TransportVariant {
    fn from(config: TransportConfig) -> Self {
        Self::Config(config)
    }
}

impl From<HttpTransportConfig> for TransportVariant {
    fn from(config: HttpTransportConfig) -> Self {
        Self::Config(config.into())
    }
}

impl From<SseTransportConfig> for TransportVariant {
    fn from(config: SseTransportConfig) -> Self {
        Self::Config(config.into())
    }
}

impl From<Arc<dyn Transport>> for TransportVariant {
    fn from(transport: Arc<dyn Transport>) -> Self {
        Self::Custom(transport)
    }
}

/// Configuration for [`Client`](crate::Client)
#[derive(Clone)]
pub struct ClientConfig {
    /// Transport to talk through
    pub transport: TransportVariant,
    /// Name sent in `clientInfo`
    pub name: String,
    /// Version sent in `clientInfo`
    pub version: String,
    /// Handler for `elicitation/create`; advertised as a client capability when set
    pub elicitation_handler: Option<Arc<dyn ElicitationHandler>>,
    /// Receives transport errors and responses for unknown IDs
    pub on_uncaught_error: Option<UncaughtErrorHandler>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("transport", &self.transport)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("elicitation_handler", &self.elicitation_handler)
            .field("on_uncaught_error", &self.on_uncaught_error.is_some())
            .finish()
    }
}

impl ClientConfig {
    /// Configuration with the default client name and version.
    pub fn new(transport: impl Into<TransportVariant>) -> Self {
        Self {
            transport: transport.into(),
            name: DEFAULT_CLIENT_NAME.to_string(),
            version: DEFAULT_CLIENT_VERSION.to_string(),
            elicitation_handler: None,
            on_uncaught_error: None,
        }
    }

    /// Set the client name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the client version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Answer `elicitation/create` with `handler`
    pub fn with_elicitation_handler(mut self, handler: Arc<dyn ElicitationHandler>) -> Self {
        self.elicitation_handler = Some(handler);
        self
    }

    /// Report uncaught errors to `handler`
    pub fn with_uncaught_error_handler(
        mut self,
        handler: impl Fn(Error) + Send + Sync + 'static,
    ) -> Self {
        self.on_uncaught_error = Some(Arc::new(handler));
        self
    }
}

/// Per-request cancellation and timeout
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Cancels the wait for a response when triggered
    pub cancellation: Option<CancellationToken>,
    /// Gives up waiting after this long
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Options with neither cancellation nor timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel with `token`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Time out after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
