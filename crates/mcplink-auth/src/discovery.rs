//! Metadata discovery for protected resources (RFC 9728) and authorization
//! servers (RFC 8414, OpenID Connect Discovery 1.0).

use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use serde::de::DeserializeOwned;
use url::Url;

use mcplink_protocol::LATEST_PROTOCOL_VERSION;

use crate::error::{AuthError, Result};
use crate::pkce::CODE_CHALLENGE_METHOD;
use crate::types::{AuthorizationServerMetadata, OAuthProtectedResourceMetadata};

const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
const PROTECTED_RESOURCE_WELL_KNOWN: &str = "oauth-protected-resource";
const OAUTH_WELL_KNOWN: &str = "oauth-authorization-server";
const OIDC_WELL_KNOWN: &str = "openid-configuration";

/// Flavor of an authorization server metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryKind {
    /// RFC 8414 `oauth-authorization-server`
    OAuth,
    /// OpenID Connect `openid-configuration`
    Oidc,
}

impl DiscoveryKind {
    fn label(self) -> &'static str {
        match self {
            Self::OAuth => "OAuth",
            Self::Oidc => "OpenID provider",
        }
    }
}

/// Pull the `resource_metadata` URL out of a `WWW-Authenticate: Bearer`
/// challenge.
pub fn extract_resource_metadata_url(headers: &HeaderMap) -> Option<Url> {
    let header = headers.get(WWW_AUTHENTICATE)?.to_str().ok()?;
    let (scheme, params) = header.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    const KEY: &str = "resource_metadata=\"";
    let start = params.find(KEY)? + KEY.len();
    let len = params[start..].find('"')?;
    Url::parse(&params[start..start + len]).ok()
}

/// GET a metadata document.
///
/// A network failure with the protocol version header is retried once without
/// it, since some servers reject unknown headers outright. A second failure
/// yields `None`.
async fn fetch_metadata(http: &reqwest::Client, url: &Url) -> Option<reqwest::Response> {
    let first = http
        .get(url.clone())
        .header(PROTOCOL_VERSION_HEADER, LATEST_PROTOCOL_VERSION)
        .send()
        .await;
    match first {
        Ok(response) => Some(response),
        Err(err) => {
            tracing::debug!(url = %url, error = %err, "Metadata fetch failed, retrying without headers");
            http.get(url.clone()).send().await.ok()
        }
    }
}

fn should_attempt_fallback(response: Option<&reqwest::Response>, pathname: &str) -> bool {
    match response {
        None => true,
        Some(response) => response.status().is_client_error() && pathname != "/",
    }
}

fn well_known_url(issuer: &Url, kind: &str) -> Result<Url> {
    let path = issuer.path().trim_end_matches('/');
    let mut url = issuer.join(&format!("/.well-known/{kind}{path}"))?;
    url.set_query(issuer.query());
    Ok(url)
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Fetch protected resource metadata for an MCP server.
///
/// Without an explicit `resource_metadata_url`, the path-aware well-known URL
/// is tried first and the root well-known URL second.
pub async fn discover_oauth_protected_resource_metadata(
    http: &reqwest::Client,
    server_url: &Url,
    resource_metadata_url: Option<&Url>,
) -> Result<OAuthProtectedResourceMetadata> {
    let url = match resource_metadata_url {
        Some(url) => url.clone(),
        None => well_known_url(server_url, PROTECTED_RESOURCE_WELL_KNOWN)?,
    };

    let mut response = fetch_metadata(http, &url).await;

    if resource_metadata_url.is_none()
        && should_attempt_fallback(response.as_ref(), server_url.path())
    {
        let root = server_url.join(&format!("/.well-known/{PROTECTED_RESOURCE_WELL_KNOWN}"))?;
        response = fetch_metadata(http, &root).await;
    }

    let response = match response {
        Some(response) if response.status() != reqwest::StatusCode::NOT_FOUND => response,
        _ => {
            return Err(AuthError::Discovery(
                "Resource server does not implement OAuth 2.0 Protected Resource Metadata."
                    .to_string(),
            ));
        }
    };

    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::Discovery(format!(
            "HTTP {} trying to load well-known OAuth protected resource metadata.",
            status.as_u16()
        )));
    }

    decode(response).await
}

/// Candidate metadata URLs for an authorization server, in the order they
/// are tried.
pub fn build_discovery_urls(authorization_server_url: &Url) -> Result<Vec<(Url, DiscoveryKind)>> {
    let mut origin = authorization_server_url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);

    let at = |path: String| origin.join(&path);

    if authorization_server_url.path() == "/" {
        return Ok(vec![
            (at(format!("/.well-known/{OAUTH_WELL_KNOWN}"))?, DiscoveryKind::OAuth),
            (at(format!("/.well-known/{OIDC_WELL_KNOWN}"))?, DiscoveryKind::Oidc),
        ]);
    }

    let path = authorization_server_url.path().trim_end_matches('/');
    Ok(vec![
        (at(format!("/.well-known/{OAUTH_WELL_KNOWN}{path}"))?, DiscoveryKind::OAuth),
        (at(format!("/.well-known/{OAUTH_WELL_KNOWN}"))?, DiscoveryKind::OAuth),
        (at(format!("/.well-known/{OIDC_WELL_KNOWN}{path}"))?, DiscoveryKind::Oidc),
        (at(format!("{path}/.well-known/{OIDC_WELL_KNOWN}"))?, DiscoveryKind::Oidc),
    ])
}

/// Fetch authorization server metadata, trying each candidate URL in turn.
///
/// Unreachable URLs and 4xx responses move on to the next candidate; any
/// other failure stops discovery. `Ok(None)` means no candidate answered.
/// OpenID provider metadata must list the `S256` challenge method.
pub async fn discover_authorization_server_metadata(
    http: &reqwest::Client,
    authorization_server_url: &Url,
) -> Result<Option<AuthorizationServerMetadata>> {
    for (url, kind) in build_discovery_urls(authorization_server_url)? {
        let Some(response) = fetch_metadata(http, &url).await else {
            continue;
        };

        let status = response.status();
        if !status.is_success() {
            if status.is_client_error() {
                continue;
            }
            return Err(AuthError::Discovery(format!(
                "HTTP {} trying to load {} metadata from {url}",
                status.as_u16(),
                kind.label()
            )));
        }

        let metadata: AuthorizationServerMetadata = decode(response).await?;

        if kind == DiscoveryKind::Oidc {
            let supports_s256 = metadata
                .code_challenge_methods_supported
                .as_ref()
                .is_some_and(|methods| methods.iter().any(|m| m == CODE_CHALLENGE_METHOD));
            if !supports_s256 {
                return Err(AuthError::IncompatibleOidcProvider {
                    url: url.to_string(),
                });
            }
        }

        tracing::debug!(url = %url, "Discovered authorization server metadata");
        return Ok(Some(metadata));
    }

    Ok(None)
}
