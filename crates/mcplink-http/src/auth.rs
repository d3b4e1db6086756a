//! Bearer tokens and `401` recovery shared by both transports.

use std::sync::Arc;

use mcplink_auth::{AuthOptions, AuthResult, OAuthClientProvider, auth, extract_resource_metadata_url};
use mcplink_transport_traits::{TransportError, TransportResult};
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};
use url::Url;

/// OAuth state a transport carries when a provider is configured.
#[derive(Debug, Clone)]
pub(crate) struct Authorizer {
    provider: Arc<dyn OAuthClientProvider>,
    http: reqwest::Client,
}

impl Authorizer {
    pub(crate) fn new(provider: Arc<dyn OAuthClientProvider>) -> TransportResult<Self> {
        let http = mcplink_auth::default_http_client()
            .map_err(|e| TransportError::Internal(format!("failed to build OAuth client: {e}")))?;
        Ok(Self { provider, http })
    }

    /// Insert `Authorization: Bearer ...` when the provider holds tokens.
    pub(crate) async fn apply(&self, headers: &mut HeaderMap) {
        match self.provider.tokens().await {
            Ok(Some(tokens)) => {
                if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", tokens.access_token)) {
                    headers.insert(header::AUTHORIZATION, value);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load OAuth tokens"),
        }
    }

    /// Run the OAuth flow after the server at `server_url` answered `401`
    /// with `challenge` headers.
    pub(crate) async fn reauthorize(&self, server_url: &Url, challenge: &HeaderMap) -> TransportResult<()> {
        let resource_metadata_url = extract_resource_metadata_url(challenge);
        debug!(?resource_metadata_url, "Server requested authorization");

        let options = AuthOptions::default().resource_metadata_url(resource_metadata_url);
        match auth(&self.http, self.provider.as_ref(), server_url, &options).await {
            Ok(AuthResult::Authorized) => {
                info!("Reauthorized with {}", server_url);
                Ok(())
            }
            Ok(AuthResult::Redirect) => Err(TransportError::Unauthorized(
                "user authorization is required".to_string(),
            )),
            Err(e) => Err(TransportError::AuthenticationFailed(e.to_string())),
        }
    }
}

/// Convert configured header pairs, skipping any that are not valid HTTP.
pub(crate) fn header_map<'a>(pairs: impl IntoIterator<Item = (&'a String, &'a String)>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in pairs {
        match (
            header::HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(k), Ok(v)) => {
                headers.insert(k, v);
            }
            _ => warn!("Skipping invalid header {}", key),
        }
    }
    headers
}
