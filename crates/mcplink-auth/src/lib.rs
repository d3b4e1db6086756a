//! # mcplink Auth
//!
//! OAuth 2.1 client engine used by mcplink transports when a server answers
//! `401 Unauthorized`.
//!
//! The engine is a set of stateless async functions. Everything that must
//! outlive a single attempt (tokens, client registration, the PKCE verifier,
//! sending the user to the authorization page) is delegated to a caller
//! supplied [`OAuthClientProvider`].
//!
//! ## Flow
//!
//! [`auth`] runs one authorization attempt:
//!
//! 1. Discover protected resource metadata (RFC 9728) to find the
//!    authorization server and the resource indicator.
//! 2. Discover authorization server metadata (RFC 8414 / OpenID Connect).
//! 3. Register the client dynamically (RFC 7591) if nothing is stored.
//! 4. Exchange an authorization code, refresh stored tokens, or start a new
//!    PKCE authorization and hand the URL to the provider.
//!
//! `invalid_client`, `unauthorized_client` and `invalid_grant` errors
//! invalidate the matching credentials and retry the attempt once.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mcplink_auth::{AuthOptions, AuthResult, auth};
//!
//! let http = mcplink_auth::default_http_client()?;
//! match auth(&http, &provider, &server_url, &AuthOptions::default()).await? {
//!     AuthResult::Authorized => { /* tokens saved, retry the request */ }
//!     AuthResult::Redirect => { /* wait for the redirect callback */ }
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod authorization;
pub mod discovery;
pub mod error;
pub mod flow;
pub mod pkce;
pub mod provider;
pub mod registration;
pub mod resource;
pub mod token;
pub mod types;

mod http;

pub use authorization::{AuthorizationRequest, start_authorization};
pub use discovery::{
    DiscoveryKind, build_discovery_urls, discover_authorization_server_metadata,
    discover_oauth_protected_resource_metadata, extract_resource_metadata_url,
};
pub use error::{AuthError, Result};
pub use flow::{AuthOptions, AuthResult, auth, select_resource_url};
pub use http::default_http_client;
pub use pkce::PkceChallenge;
pub use provider::{InvalidationScope, OAuthClientProvider};
pub use registration::register_client;
pub use resource::{check_resource_allowed, resource_url_from_server_url, validate_resource};
pub use token::{
    ClientAuthMethod, TokenRequest, apply_client_authentication, exchange_authorization,
    parse_error_response, refresh_authorization, select_client_auth_method,
};
pub use types::{
    AuthorizationServerMetadata, OAuthClientInformation, OAuthClientInformationFull,
    OAuthClientMetadata, OAuthErrorResponse, OAuthProtectedResourceMetadata, OAuthTokens, SafeUrl,
};
