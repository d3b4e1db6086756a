//! HTTP plumbing shared by the OAuth endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{AuthError, Result};
use crate::token::parse_error_response;

/// Default timeout for OAuth endpoint requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for OAuth traffic.
///
/// Redirects are not followed: discovery and token responses must come from
/// the URL that was asked.
pub fn default_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(AuthError::from)
}

/// Decode a 2xx body as `T`, or map the body to an OAuth error.
pub(crate) async fn read_oauth_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), "OAuth endpoint returned an error");
        return Err(parse_error_response(Some(status.as_u16()), &body));
    }
    Ok(serde_json::from_str(&body)?)
}
