//! Error types for the OAuth client engine.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors raised by discovery, registration, token and authorization steps.
///
/// The first four variants mirror the OAuth 2.1 error codes that the flow
/// reacts to (see [`AuthError::from_oauth_code`]). Every other variant is a
/// local failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    /// `server_error`, or any error code the engine does not recognize
    #[error("Server error: {description}")]
    ServerError {
        /// `error_description` from the response
        description: String,
        /// `error_uri` from the response
        uri: Option<String>,
    },

    /// `invalid_client`
    #[error("Invalid client: {description}")]
    InvalidClient {
        /// `error_description` from the response
        description: String,
        /// `error_uri` from the response
        uri: Option<String>,
    },

    /// `invalid_grant`
    #[error("Invalid grant: {description}")]
    InvalidGrant {
        /// `error_description` from the response
        description: String,
        /// `error_uri` from the response
        uri: Option<String>,
    },

    /// `unauthorized_client`
    #[error("Unauthorized client: {description}")]
    UnauthorizedClient {
        /// `error_description` from the response
        description: String,
        /// `error_uri` from the response
        uri: Option<String>,
    },

    /// Credentials were rejected and no further attempt is possible
    #[error("Unauthorized")]
    Unauthorized,

    /// An authorization code was supplied but no client is registered
    #[error("Existing OAuth client information is required when exchanging an authorization code")]
    MissingClientInformation,

    /// Dynamic registration is needed but the provider cannot persist it
    #[error("OAuth client information must be saveable for dynamic registration")]
    ClientInformationNotSaveable,

    /// Authorization server metadata has no registration endpoint
    #[error("Incompatible auth server: does not support dynamic client registration")]
    RegistrationUnsupported,

    /// `client_secret_basic` was selected without a secret
    #[error("client_secret_basic authentication requires a client_secret")]
    MissingClientSecret,

    /// Server metadata lacks a response type, grant type or PKCE method
    #[error("Incompatible auth server: {0}")]
    IncompatibleServer(String),

    /// OpenID provider metadata does not list `S256`
    #[error(
        "Incompatible OIDC provider at {url}: does not support S256 code challenge method required by MCP specification"
    )]
    IncompatibleOidcProvider {
        /// Discovery URL that returned the metadata
        url: String,
    },

    /// Protected resource metadata names a resource that is not ours
    #[error("Protected resource {resource} does not match expected {expected} (or origin)")]
    ResourceMismatch {
        /// Resource advertised by the metadata
        resource: String,
        /// Resource derived from the server URL
        expected: String,
    },

    /// Metadata discovery failed
    #[error("{0}")]
    Discovery(String),

    /// A metadata URL uses a forbidden scheme
    #[error("URL cannot use javascript:, data:, or vbscript: scheme (got {scheme}) for {url}")]
    UnsafeUrl {
        /// Offending URL
        url: String,
        /// Its scheme
        scheme: String,
    },

    /// A URL could not be parsed or resolved
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Network failure talking to an OAuth endpoint
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A successful response body could not be decoded
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    /// Failure raised by an [`OAuthClientProvider`](crate::OAuthClientProvider)
    #[error("OAuth provider error: {0}")]
    Provider(String),
}

impl AuthError {
    /// Build the error matching an OAuth `error` code.
    ///
    /// Unknown codes map to [`AuthError::ServerError`].
    pub fn from_oauth_code(code: &str, description: String, uri: Option<String>) -> Self {
        match code {
            "invalid_client" => Self::InvalidClient { description, uri },
            "invalid_grant" => Self::InvalidGrant { description, uri },
            "unauthorized_client" => Self::UnauthorizedClient { description, uri },
            _ => Self::ServerError { description, uri },
        }
    }

    /// OAuth error code for wire-level errors.
    pub fn oauth_code(&self) -> Option<&'static str> {
        match self {
            Self::ServerError { .. } => Some("server_error"),
            Self::InvalidClient { .. } => Some("invalid_client"),
            Self::InvalidGrant { .. } => Some("invalid_grant"),
            Self::UnauthorizedClient { .. } => Some("unauthorized_client"),
            _ => None,
        }
    }

    /// Whether the error came from an OAuth error response.
    pub fn is_oauth_error(&self) -> bool {
        self.oauth_code().is_some()
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_oauth_code() {
        let err = AuthError::from_oauth_code("invalid_grant", "expired".into(), None);
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
        assert_eq!(err.oauth_code(), Some("invalid_grant"));

        let err = AuthError::from_oauth_code("slow_down", "wait".into(), None);
        assert!(matches!(err, AuthError::ServerError { .. }));
        assert!(err.is_oauth_error());
    }

    #[test]
    fn test_local_errors_are_not_oauth_errors() {
        assert!(!AuthError::Unauthorized.is_oauth_error());
        assert!(!AuthError::Http("reset".into()).is_oauth_error());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            AuthError::RegistrationUnsupported.to_string(),
            "Incompatible auth server: does not support dynamic client registration"
        );
        assert_eq!(
            AuthError::IncompatibleServer("does not support response type code".into()).to_string(),
            "Incompatible auth server: does not support response type code"
        );
    }
}
