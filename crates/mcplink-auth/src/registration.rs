//! OAuth 2.0 Dynamic Client Registration (RFC 7591)

use url::Url;

use crate::error::{AuthError, Result};
use crate::http::read_oauth_json;
use crate::types::{AuthorizationServerMetadata, OAuthClientInformationFull, OAuthClientMetadata};

/// Register a client with the authorization server.
///
/// Without metadata the endpoint defaults to `/register` under the server
/// URL. With metadata, a missing `registration_endpoint` means the server does
/// not offer registration.
pub async fn register_client(
    http: &reqwest::Client,
    authorization_server_url: &Url,
    metadata: Option<&AuthorizationServerMetadata>,
    client_metadata: &OAuthClientMetadata,
) -> Result<OAuthClientInformationFull> {
    let registration_url = match metadata {
        Some(metadata) => metadata
            .registration_endpoint
            .as_ref()
            .map(|endpoint| endpoint.as_url().clone())
            .ok_or(AuthError::RegistrationUnsupported)?,
        None => authorization_server_url.join("/register")?,
    };

    tracing::info!(url = %registration_url, "Registering OAuth client");

    let response = http
        .post(registration_url)
        .json(client_metadata)
        .send()
        .await?;
    read_oauth_json(response).await
}
