//! Transport configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mcplink_auth::OAuthClientProvider;
use mcplink_transport_traits::{Transport, TransportResult};

use crate::legacy::SseTransport;
use crate::streamable::HttpTransport;

/// Backoff for reopening a dropped inbound SSE stream.
///
/// The delay before attempt `n` (starting at 0) is
/// `min(initial_delay * growth_factor^n, max_delay)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconnectionOptions {
    /// Delay before the first reconnection attempt
    pub initial_delay: Duration,
    /// Multiplier applied per attempt
    pub growth_factor: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Attempts allowed between successful connections; `0` never gives up
    pub max_retries: u32,
}

impl Default for ReconnectionOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            growth_factor: 1.5,
            max_delay: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl ReconnectionOptions {
    /// Delay before reconnection attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.growth_factor.powf(f64::from(attempt));
        Duration::try_from_secs_f64(scaled).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Returns `true` once `attempts` has used up the retry budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_retries > 0 && attempts >= self.max_retries
    }
}

/// Streamable HTTP transport configuration
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// MCP endpoint URL (e.g., <https://api.example.com/mcp>)
    pub url: String,

    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,

    /// OAuth provider consulted for bearer tokens and on `401`
    pub auth_provider: Option<Arc<dyn OAuthClientProvider>>,

    /// Inbound stream reconnection backoff
    pub reconnection: ReconnectionOptions,

    /// Timeout for a POST, including reading its body
    pub request_timeout: Option<Duration>,
}

impl HttpTransportConfig {
    /// Configuration for the endpoint at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            auth_provider: None,
            reconnection: ReconnectionOptions::default(),
            request_timeout: None,
        }
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Authorize requests through `provider`.
    pub fn with_auth_provider(mut self, provider: Arc<dyn OAuthClientProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    /// Replace the reconnection backoff.
    pub fn with_reconnection(mut self, reconnection: ReconnectionOptions) -> Self {
        self.reconnection = reconnection;
        self
    }

    /// Bound every POST by `timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Legacy HTTP+SSE transport configuration
#[derive(Clone, Debug)]
pub struct SseTransportConfig {
    /// SSE endpoint URL
    pub url: String,
    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,
    /// OAuth provider consulted for bearer tokens and on `401`
    pub auth_provider: Option<Arc<dyn OAuthClientProvider>>,
}

impl SseTransportConfig {
    /// Configuration for the SSE endpoint at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            auth_provider: None,
        }
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Authorize requests through `provider`.
    pub fn with_auth_provider(mut self, provider: Arc<dyn OAuthClientProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }
}

/// Which HTTP transport to build.
#[derive(Clone, Debug)]
pub enum TransportConfig {
    /// Legacy HTTP+SSE (`endpoint` event, separate POST URL)
    Sse(SseTransportConfig),
    /// Streamable HTTP
    Http(HttpTransportConfig),
}

impl TransportConfig {
    /// Build the configured transport.
    pub fn build(self) -> TransportResult<Arc<dyn Transport>> {
        Ok(match self {
            Self::Sse(config) => Arc::new(SseTransport::new(config)?),
            Self::Http(config) => Arc::new(HttpTransport::new(config)?),
        })
    }
}

impl From<HttpTransportConfig> for TransportConfig {
    fn from(config: HttpTransportConfig) -> Self {
        Self::Http(config)
    }
}

impl From<SseTransportConfig> for TransportConfig {
    fn from(config: SseTransportConfig) -> Self {
        Self::Sse(config)
    }
}
