//! Resource indicators (RFC 8707) and their validation against protected
//! resource metadata.

use url::Url;

use crate::error::AuthError;

/// Canonical resource indicator for an MCP server URL: the URL without its
/// fragment.
pub fn resource_url_from_server_url(server_url: &Url) -> Url {
    let mut resource = server_url.clone();
    resource.set_fragment(None);
    resource
}

/// Whether `requested` may use tokens issued for `configured`.
///
/// Origins must match exactly (scheme, host and effective port). The
/// requested path must then sit at or below the configured path, compared on
/// whole segments: `/api/v1` is allowed under `/api`, `/apiv1` is not.
pub fn check_resource_allowed(requested: &Url, configured: &Url) -> bool {
    if requested.origin() != configured.origin() {
        return false;
    }

    let requested_path = requested.path();
    let configured_path = configured.path();

    // `/folder` must not match a configured `/folder/`
    if requested_path.len() < configured_path.len() {
        return false;
    }

    with_trailing_slash(requested_path).starts_with(&with_trailing_slash(configured_path))
}

/// Built-in resource selection used when a provider does not customize it.
///
/// With no advertised resource, no indicator is sent. Otherwise the
/// advertised resource must cover `server_url` and is returned.
pub fn validate_resource(
    server_url: &Url,
    advertised: Option<&Url>,
) -> Result<Option<Url>, AuthError> {
    let Some(advertised) = advertised else {
        return Ok(None);
    };

    let expected = resource_url_from_server_url(server_url);
    if !check_resource_allowed(&expected, advertised) {
        return Err(AuthError::ResourceMismatch {
            resource: advertised.to_string(),
            expected: expected.to_string(),
        });
    }

    Ok(Some(advertised.clone()))
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}
