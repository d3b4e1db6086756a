//! The `auth()` orchestration: discovery, registration, code exchange,
//! refresh and redirect.

use url::Url;

use crate::authorization::start_authorization;
use crate::discovery::{
    discover_authorization_server_metadata, discover_oauth_protected_resource_metadata,
};
use crate::error::{AuthError, Result};
use crate::provider::{InvalidationScope, OAuthClientProvider};
use crate::registration::register_client;
use crate::resource::resource_url_from_server_url;
use crate::token::{TokenRequest, exchange_authorization, refresh_authorization};
use crate::types::{OAuthClientInformation, OAuthProtectedResourceMetadata};

/// Outcome of one authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthResult {
    /// Fresh tokens were saved with the provider
    Authorized,
    /// The user agent was sent to the authorization page; call [`auth`] again
    /// with the returned code
    Redirect,
}

/// Optional inputs to [`auth`].
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    /// Code received on the redirect URI
    pub authorization_code: Option<String>,
    /// Scope to request; defaults to the client metadata scope
    pub scope: Option<String>,
    /// Protected resource metadata URL taken from a `WWW-Authenticate`
    /// challenge
    pub resource_metadata_url: Option<Url>,
}

impl AuthOptions {
    /// Options for completing an authorization with `code`.
    pub fn with_authorization_code(code: impl Into<String>) -> Self {
        Self {
            authorization_code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Set the protected resource metadata URL.
    pub fn resource_metadata_url(mut self, url: Option<Url>) -> Self {
        self.resource_metadata_url = url;
        self
    }

    /// Set the requested scope.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Run one authorization attempt against the MCP server at `server_url`.
///
/// A rejected client (`invalid_client`, `unauthorized_client`) clears all
/// stored credentials and a rejected grant (`invalid_grant`) clears the
/// tokens; either way the attempt is retried once.
pub async fn auth(
    http: &reqwest::Client,
    provider: &dyn OAuthClientProvider,
    server_url: &Url,
    options: &AuthOptions,
) -> Result<AuthResult> {
    match auth_internal(http, provider, server_url, options).await {
        Err(err @ (AuthError::InvalidClient { .. } | AuthError::UnauthorizedClient { .. })) => {
            tracing::warn!(error = %err, "OAuth client rejected, invalidating all credentials");
            provider.invalidate_credentials(InvalidationScope::All).await?;
            auth_internal(http, provider, server_url, options).await
        }
        Err(err @ AuthError::InvalidGrant { .. }) => {
            tracing::warn!(error = %err, "OAuth grant rejected, invalidating tokens");
            provider.invalidate_credentials(InvalidationScope::Tokens).await?;
            auth_internal(http, provider, server_url, options).await
        }
        other => other,
    }
}

/// Resource indicator to send, as chosen by the provider from the discovered
/// protected resource metadata.
///
/// The provider sees the server URL with its fragment removed.
pub async fn select_resource_url(
    server_url: &Url,
    provider: &dyn OAuthClientProvider,
    resource_metadata: Option<&OAuthProtectedResourceMetadata>,
) -> Result<Option<Url>> {
    let default_resource = resource_url_from_server_url(server_url);
    provider
        .validate_resource_url(&default_resource, resource_metadata.map(|m| &m.resource))
        .await
}

async fn auth_internal(
    http: &reqwest::Client,
    provider: &dyn OAuthClientProvider,
    server_url: &Url,
    options: &AuthOptions,
) -> Result<AuthResult> {
    let resource_metadata = match discover_oauth_protected_resource_metadata(
        http,
        server_url,
        options.resource_metadata_url.as_ref(),
    )
    .await
    {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            tracing::debug!(error = %err, "Protected resource metadata unavailable");
            None
        }
    };

    let authorization_server_url = resource_metadata
        .as_ref()
        .and_then(|m| m.authorization_servers.as_ref())
        .and_then(|servers| servers.first())
        .map(|server| server.as_url().clone())
        .unwrap_or_else(|| server_url.clone());

    let resource = select_resource_url(server_url, provider, resource_metadata.as_ref()).await?;

    let metadata = discover_authorization_server_metadata(http, &authorization_server_url).await?;

    let client_information = match provider.client_information().await? {
        Some(information) => information,
        None => {
            if options.authorization_code.is_some() {
                return Err(AuthError::MissingClientInformation);
            }
            if !provider.can_save_client_information() {
                return Err(AuthError::ClientInformationNotSaveable);
            }

            let full = register_client(
                http,
                &authorization_server_url,
                metadata.as_ref(),
                provider.client_metadata(),
            )
            .await?;
            let information: OAuthClientInformation = full.information.clone();
            provider.save_client_information(full).await?;
            information
        }
    };

    let request = TokenRequest::new(&authorization_server_url, &client_information)
        .with_metadata(metadata.as_ref())
        .with_resource(resource.as_ref())
        .with_client_authentication(provider);

    if let Some(code) = &options.authorization_code {
        let verifier = provider.code_verifier().await?;
        let tokens =
            exchange_authorization(http, &request, code, &verifier, provider.redirect_url()).await?;
        provider.save_tokens(tokens).await?;
        return Ok(AuthResult::Authorized);
    }

    if let Some(refresh_token) = provider.tokens().await?.and_then(|t| t.refresh_token) {
        let refreshed = async {
            let tokens = refresh_authorization(http, &request, &refresh_token).await?;
            provider.save_tokens(tokens).await
        }
        .await;

        match refreshed {
            Ok(()) => return Ok(AuthResult::Authorized),
            Err(err) if !err.is_oauth_error() || matches!(err, AuthError::ServerError { .. }) => {
                tracing::debug!(error = %err, "Could not refresh OAuth tokens, starting a new authorization");
            }
            Err(err) => return Err(err),
        }
    }

    let state = provider.state().await?;
    let scope = options
        .scope
        .as_deref()
        .or(provider.client_metadata().scope.as_deref());

    let authorization = start_authorization(
        &authorization_server_url,
        metadata.as_ref(),
        &client_information,
        provider.redirect_url(),
        scope,
        state.as_deref(),
        resource.as_ref(),
    )?;

    provider
        .save_code_verifier(authorization.code_verifier)
        .await?;
    provider
        .redirect_to_authorization(authorization.authorization_url)
        .await?;
    Ok(AuthResult::Redirect)
}
