//! Building the authorization request URL.

use url::Url;

use crate::error::{AuthError, Result};
use crate::pkce::{CODE_CHALLENGE_METHOD, PkceChallenge};
use crate::types::{AuthorizationServerMetadata, OAuthClientInformation};

const RESPONSE_TYPE_CODE: &str = "code";

/// An authorization URL and the PKCE verifier that must be kept for the
/// code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Where to send the user agent
    pub authorization_url: Url,
    /// Verifier matching the `code_challenge` in the URL
    pub code_verifier: String,
}

/// Build an authorization code request with a fresh PKCE challenge.
///
/// When metadata is available it must list the `code` response type and the
/// `S256` challenge method. Without metadata the endpoint defaults to
/// `/authorize` under the server URL. Scopes containing `offline_access` also
/// request `prompt=consent` so the server issues a refresh token.
pub fn start_authorization(
    authorization_server_url: &Url,
    metadata: Option<&AuthorizationServerMetadata>,
    client_information: &OAuthClientInformation,
    redirect_url: &Url,
    scope: Option<&str>,
    state: Option<&str>,
    resource: Option<&Url>,
) -> Result<AuthorizationRequest> {
    let mut authorization_url = match metadata {
        Some(metadata) => {
            if !metadata
                .response_types_supported
                .iter()
                .any(|t| t == RESPONSE_TYPE_CODE)
            {
                return Err(AuthError::IncompatibleServer(format!(
                    "does not support response type {RESPONSE_TYPE_CODE}"
                )));
            }
            let supports_s256 = metadata
                .code_challenge_methods_supported
                .as_ref()
                .is_some_and(|methods| methods.iter().any(|m| m == CODE_CHALLENGE_METHOD));
            if !supports_s256 {
                return Err(AuthError::IncompatibleServer(format!(
                    "does not support code challenge method {CODE_CHALLENGE_METHOD}"
                )));
            }
            metadata.authorization_endpoint.as_url().clone()
        }
        None => authorization_server_url.join("/authorize")?,
    };

    let pkce = PkceChallenge::generate();

    {
        let mut query = authorization_url.query_pairs_mut();
        query
            .append_pair("response_type", RESPONSE_TYPE_CODE)
            .append_pair("client_id", &client_information.client_id)
            .append_pair("code_challenge", &pkce.code_challenge)
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD)
            .append_pair("redirect_uri", redirect_url.as_str());

        if let Some(state) = state {
            query.append_pair("state", state);
        }
        if let Some(scope) = scope {
            query.append_pair("scope", scope);
            if scope.contains("offline_access") {
                query.append_pair("prompt", "consent");
            }
        }
        if let Some(resource) = resource {
            query.append_pair("resource", resource.as_str());
        }
    }

    Ok(AuthorizationRequest {
        authorization_url,
        code_verifier: pkce.code_verifier,
    })
}
