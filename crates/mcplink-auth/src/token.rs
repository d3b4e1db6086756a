//! Token endpoint requests: code exchange, refresh and client authentication.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use url::Url;

use crate::error::{AuthError, Result};
use crate::http::read_oauth_json;
use crate::provider::OAuthClientProvider;
use crate::types::{
    AuthorizationServerMetadata, OAuthClientInformation, OAuthErrorResponse, OAuthTokens,
};

const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// Token endpoint client authentication methods understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientAuthMethod {
    /// HTTP Basic with `client_id:client_secret`
    ClientSecretBasic,
    /// `client_id` and `client_secret` form parameters
    ClientSecretPost,
    /// Public client, `client_id` form parameter only
    None,
}

impl ClientAuthMethod {
    /// Registered method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::None => "none",
        }
    }
}

/// Pick the client authentication method.
///
/// With no advertised methods, a client with a secret posts it and a public
/// client sends only its id. Otherwise `client_secret_basic` is preferred over
/// `client_secret_post`, then `none`.
pub fn select_client_auth_method(
    client_information: &OAuthClientInformation,
    supported: &[String],
) -> ClientAuthMethod {
    let has_secret = client_information.client_secret.is_some();
    let supports = |method: ClientAuthMethod| supported.iter().any(|m| m == method.as_str());

    let fallback = if has_secret {
        ClientAuthMethod::ClientSecretPost
    } else {
        ClientAuthMethod::None
    };

    if supported.is_empty() {
        return fallback;
    }
    if has_secret && supports(ClientAuthMethod::ClientSecretBasic) {
        return ClientAuthMethod::ClientSecretBasic;
    }
    if has_secret && supports(ClientAuthMethod::ClientSecretPost) {
        return ClientAuthMethod::ClientSecretPost;
    }
    if supports(ClientAuthMethod::None) {
        return ClientAuthMethod::None;
    }
    fallback
}

/// Add the credentials for `method` to a token request.
pub fn apply_client_authentication(
    method: ClientAuthMethod,
    client_information: &OAuthClientInformation,
    headers: &mut HeaderMap,
    params: &mut Vec<(String, String)>,
) -> Result<()> {
    let client_id = &client_information.client_id;
    match method {
        ClientAuthMethod::ClientSecretBasic => {
            let secret = client_information
                .client_secret
                .as_deref()
                .ok_or(AuthError::MissingClientSecret)?;
            let credentials = STANDARD.encode(format!("{client_id}:{secret}"));
            let value = HeaderValue::from_str(&format!("Basic {credentials}"))
                .map_err(|e| AuthError::Http(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        ClientAuthMethod::ClientSecretPost => {
            params.push(("client_id".to_string(), client_id.clone()));
            if let Some(secret) = &client_information.client_secret {
                params.push(("client_secret".to_string(), secret.clone()));
            }
        }
        ClientAuthMethod::None => {
            params.push(("client_id".to_string(), client_id.clone()));
        }
    }
    Ok(())
}

/// Map an OAuth error response body to an [`AuthError`].
///
/// Bodies that are not OAuth error JSON become [`AuthError::ServerError`]
/// carrying the raw body.
pub fn parse_error_response(status: Option<u16>, body: &str) -> AuthError {
    match serde_json::from_str::<OAuthErrorResponse>(body) {
        Ok(parsed) => AuthError::from_oauth_code(
            &parsed.error,
            parsed.error_description.unwrap_or_default(),
            parsed.error_uri,
        ),
        Err(err) => {
            let prefix = status.map(|s| format!("HTTP {s}: ")).unwrap_or_default();
            AuthError::ServerError {
                description: format!("{prefix}Invalid OAuth error response: {err}. Raw body: {body}"),
                uri: None,
            }
        }
    }
}

/// Common inputs for token endpoint requests.
#[derive(Debug, Clone, Copy)]
pub struct TokenRequest<'a> {
    /// Authorization server base URL
    pub authorization_server_url: &'a Url,
    /// Discovered metadata; `/token` under the server URL is used without it
    pub metadata: Option<&'a AuthorizationServerMetadata>,
    /// Registered client
    pub client_information: &'a OAuthClientInformation,
    /// Resource indicator (RFC 8707)
    pub resource: Option<&'a Url>,
    /// Provider whose [`add_client_authentication`] replaces the built-in
    /// method selection
    ///
    /// [`add_client_authentication`]: OAuthClientProvider::add_client_authentication
    pub client_authentication: Option<&'a dyn OAuthClientProvider>,
}

impl<'a> TokenRequest<'a> {
    /// Request against `authorization_server_url` for `client_information`.
    pub fn new(
        authorization_server_url: &'a Url,
        client_information: &'a OAuthClientInformation,
    ) -> Self {
        Self {
            authorization_server_url,
            metadata: None,
            client_information,
            resource: None,
            client_authentication: None,
        }
    }

    /// Use discovered metadata.
    pub fn with_metadata(mut self, metadata: Option<&'a AuthorizationServerMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Send a resource indicator.
    pub fn with_resource(mut self, resource: Option<&'a Url>) -> Self {
        self.resource = resource;
        self
    }

    /// Delegate client authentication to `provider`.
    pub fn with_client_authentication(mut self, provider: &'a dyn OAuthClientProvider) -> Self {
        self.client_authentication = Some(provider);
        self
    }

    fn token_url(&self) -> Result<Url> {
        match self.metadata {
            Some(metadata) => Ok(metadata.token_endpoint.as_url().clone()),
            None => Ok(self.authorization_server_url.join("/token")?),
        }
    }

    fn ensure_grant_type(&self, grant_type: &str) -> Result<()> {
        let supported = self
            .metadata
            .and_then(|m| m.grant_types_supported.as_ref());
        match supported {
            Some(grants) if !grants.iter().any(|g| g == grant_type) => Err(
                AuthError::IncompatibleServer(format!("does not support grant type {grant_type}")),
            ),
            _ => Ok(()),
        }
    }
}

/// Exchange an authorization code for tokens.
pub async fn exchange_authorization(
    http: &reqwest::Client,
    request: &TokenRequest<'_>,
    authorization_code: &str,
    code_verifier: &str,
    redirect_uri: &Url,
) -> Result<OAuthTokens> {
    let params = vec![
        ("grant_type".to_string(), GRANT_AUTHORIZATION_CODE.to_string()),
        ("code".to_string(), authorization_code.to_string()),
        ("code_verifier".to_string(), code_verifier.to_string()),
        ("redirect_uri".to_string(), redirect_uri.to_string()),
    ];
    request_tokens(http, request, GRANT_AUTHORIZATION_CODE, params).await
}

/// Refresh tokens.
///
/// When the server does not rotate the refresh token, the one that was sent
/// is kept in the result.
pub async fn refresh_authorization(
    http: &reqwest::Client,
    request: &TokenRequest<'_>,
    refresh_token: &str,
) -> Result<OAuthTokens> {
    let params = vec![
        ("grant_type".to_string(), GRANT_REFRESH_TOKEN.to_string()),
        ("refresh_token".to_string(), refresh_token.to_string()),
    ];
    let mut tokens = request_tokens(http, request, GRANT_REFRESH_TOKEN, params).await?;
    if tokens.refresh_token.is_none() {
        tokens.refresh_token = Some(refresh_token.to_string());
    }
    Ok(tokens)
}

async fn request_tokens(
    http: &reqwest::Client,
    request: &TokenRequest<'_>,
    grant_type: &str,
    mut params: Vec<(String, String)>,
) -> Result<OAuthTokens> {
    let token_url = request.token_url()?;
    request.ensure_grant_type(grant_type)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    match request.client_authentication {
        Some(provider) => {
            provider
                .add_client_authentication(
                    &mut headers,
                    &mut params,
                    request.authorization_server_url,
                    request.metadata,
                    request.client_information,
                )
                .await?
        }
        None => {
            let supported = request
                .metadata
                .and_then(|m| m.token_endpoint_auth_methods_supported.as_deref())
                .unwrap_or_default();
            let method = select_client_auth_method(request.client_information, supported);
            apply_client_authentication(method, request.client_information, &mut headers, &mut params)?;
        }
    }

    if let Some(resource) = request.resource {
        params.push(("resource".to_string(), resource.to_string()));
    }

    tracing::debug!(url = %token_url, grant_type, "Requesting OAuth tokens");

    let response = http
        .post(token_url)
        .headers(headers)
        .form(&params)
        .send()
        .await?;
    read_oauth_json(response).await
}
