//! The storage and user-interaction seam of the OAuth flow.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::AuthError;
use crate::token::{apply_client_authentication, select_client_auth_method};
use crate::types::{
    AuthorizationServerMetadata, OAuthClientInformation, OAuthClientInformationFull,
    OAuthClientMetadata, OAuthTokens,
};

/// Which stored credentials to discard after the server rejected them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidationScope {
    /// Tokens, client information and the code verifier
    All,
    /// Client information only
    Client,
    /// Tokens only
    Tokens,
    /// The PKCE code verifier only
    Verifier,
}

/// Persistence and redirection for one OAuth client identity.
///
/// Implementations are shared between a transport and the [`auth`](crate::auth)
/// flow, so every method takes `&self`; use interior mutability for storage.
///
/// Optional behavior is expressed through default methods. A provider that can
/// persist dynamically registered clients overrides both
/// [`can_save_client_information`](Self::can_save_client_information) and
/// [`save_client_information`](Self::save_client_information).
#[async_trait]
pub trait OAuthClientProvider: Send + Sync + std::fmt::Debug {
    /// Stored tokens, if any.
    async fn tokens(&self) -> Result<Option<OAuthTokens>, AuthError>;

    /// Persist newly issued tokens.
    async fn save_tokens(&self, tokens: OAuthTokens) -> Result<(), AuthError>;

    /// Send the user agent to the authorization URL.
    async fn redirect_to_authorization(&self, authorization_url: Url) -> Result<(), AuthError>;

    /// Persist the PKCE verifier for the pending authorization.
    async fn save_code_verifier(&self, code_verifier: String) -> Result<(), AuthError>;

    /// The verifier saved for the pending authorization.
    async fn code_verifier(&self) -> Result<String, AuthError>;

    /// Redirect URI registered for this client.
    fn redirect_url(&self) -> &Url;

    /// Metadata used for dynamic client registration.
    fn client_metadata(&self) -> &OAuthClientMetadata;

    /// Stored client registration, if any.
    async fn client_information(&self) -> Result<Option<OAuthClientInformation>, AuthError>;

    /// Whether [`save_client_information`](Self::save_client_information) is
    /// implemented. Dynamic registration is refused when this is `false`.
    fn can_save_client_information(&self) -> bool {
        false
    }

    /// Persist a dynamically registered client.
    async fn save_client_information(
        &self,
        _information: OAuthClientInformationFull,
    ) -> Result<(), AuthError> {
        Err(AuthError::ClientInformationNotSaveable)
    }

    /// Discard credentials the server rejected.
    async fn invalidate_credentials(&self, _scope: InvalidationScope) -> Result<(), AuthError> {
        Ok(())
    }

    /// Opaque `state` value for the authorization request.
    async fn state(&self) -> Result<Option<String>, AuthError> {
        Ok(None)
    }

    /// Authenticate the client on a token endpoint request.
    ///
    /// The default picks the method from the server's supported list and the
    /// stored secret.
    async fn add_client_authentication(
        &self,
        headers: &mut HeaderMap,
        params: &mut Vec<(String, String)>,
        _authorization_server_url: &Url,
        metadata: Option<&AuthorizationServerMetadata>,
        client_information: &OAuthClientInformation,
    ) -> Result<(), AuthError> {
        let supported = metadata
            .and_then(|m| m.token_endpoint_auth_methods_supported.as_deref())
            .unwrap_or_default();
        let method = select_client_auth_method(client_information, supported);
        apply_client_authentication(method, client_information, headers, params)
    }

    /// Choose the resource indicator sent with authorization and token
    /// requests.
    ///
    /// `resource` is the resource advertised by protected resource metadata,
    /// when discovery succeeded. The default rejects resources that do not
    /// cover `server_url` and sends nothing when no metadata was found.
    async fn validate_resource_url(
        &self,
        server_url: &Url,
        resource: Option<&Url>,
    ) -> Result<Option<Url>, AuthError> {
        crate::resource::validate_resource(server_url, resource)
    }
}
