//! Common test utilities for OAuth flow integration tests
//!
//! Provides a wiremock-backed authorization server and an in-memory
//! [`OAuthClientProvider`].

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use mcplink_auth::{
    AuthError, InvalidationScope, OAuthClientInformation, OAuthClientInformationFull,
    OAuthClientMetadata, OAuthClientProvider, OAuthTokens, SafeUrl,
};
use serde_json::json;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const REDIRECT_URL: &str = "http://localhost:3000/callback";

/// Mock authorization server that is also the protected MCP server
pub struct MockOAuth2Server {
    pub server: MockServer,
}

impl MockOAuth2Server {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("{}{}", self.server.uri(), path)).unwrap()
    }

    /// Authorization server metadata pointing at this server
    pub fn metadata_json(&self) -> serde_json::Value {
        let base = self.uri();
        json!({
            "issuer": base,
            "authorization_endpoint": format!("{base}/authorize"),
            "token_endpoint": format!("{base}/token"),
            "registration_endpoint": format!("{base}/register"),
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code", "refresh_token"],
            "code_challenge_methods_supported": ["S256"],
        })
    }

    /// Protected resource metadata for `resource`, naming this server as AS
    pub async fn mock_protected_resource(&self, resource: &str) {
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-protected-resource"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resource": resource,
                "authorization_servers": [self.uri()],
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_authorization_server_metadata(&self) {
        Mock::given(method("GET"))
            .and(path("/.well-known/oauth-authorization-server"))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.metadata_json()))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_token_success(&self, access_token: &str, refresh_token: Option<&str>) {
        let mut body = json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
        });
        if let Some(refresh) = refresh_token {
            body["refresh_token"] = json!(refresh);
        }

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_token_error(&self, error: &str, description: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": error,
                "error_description": description,
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_registration(&self, client_id: &str) {
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "client_id": client_id,
                "client_id_issued_at": 1_700_000_000u64,
                "redirect_uris": [REDIRECT_URL],
                "client_name": "mcplink-test",
            })))
            .mount(&self.server)
            .await;
    }

    /// Requests received on `path`
    pub async fn hits(&self, request_path: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == request_path)
            .collect()
    }
}

/// Form body of a recorded request as key/value pairs
pub fn form_params(request: &wiremock::Request) -> Vec<(String, String)> {
    url::form_urlencoded::parse(&request.body)
        .into_owned()
        .collect()
}

/// Provider keeping everything in memory and recording side effects
#[derive(Debug)]
pub struct InMemoryProvider {
    pub redirect_url: Url,
    pub metadata: OAuthClientMetadata,
    pub saveable: bool,
    pub tokens: Mutex<Option<OAuthTokens>>,
    pub client: Mutex<Option<OAuthClientInformation>>,
    pub verifier: Mutex<Option<String>>,
    pub redirects: Mutex<Vec<Url>>,
    pub invalidations: Mutex<Vec<InvalidationScope>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        let redirect = SafeUrl::parse(REDIRECT_URL).unwrap();
        Self {
            redirect_url: redirect.as_url().clone(),
            metadata: OAuthClientMetadata::new("mcplink-test", redirect),
            saveable: true,
            tokens: Mutex::new(None),
            client: Mutex::new(None),
            verifier: Mutex::new(None),
            redirects: Mutex::new(Vec::new()),
            invalidations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_client(self, client: OAuthClientInformation) -> Self {
        *self.client.lock().unwrap() = Some(client);
        self
    }

    pub fn with_tokens(self, tokens: OAuthTokens) -> Self {
        *self.tokens.lock().unwrap() = Some(tokens);
        self
    }

    pub fn with_verifier(self, verifier: &str) -> Self {
        *self.verifier.lock().unwrap() = Some(verifier.to_string());
        self
    }

    pub fn with_scope(mut self, scope: &str) -> Self {
        self.metadata = self.metadata.with_scope(scope);
        self
    }

    pub fn not_saveable(mut self) -> Self {
        self.saveable = false;
        self
    }

    pub fn saved_tokens(&self) -> Option<OAuthTokens> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn redirect_count(&self) -> usize {
        self.redirects.lock().unwrap().len()
    }
}

#[async_trait]
impl OAuthClientProvider for InMemoryProvider {
    async fn tokens(&self) -> Result<Option<OAuthTokens>, AuthError> {
        Ok(self.tokens.lock().unwrap().clone())
    }

    async fn save_tokens(&self, tokens: OAuthTokens) -> Result<(), AuthError> {
        *self.tokens.lock().unwrap() = Some(tokens);
        Ok(())
    }

    async fn redirect_to_authorization(&self, authorization_url: Url) -> Result<(), AuthError> {
        self.redirects.lock().unwrap().push(authorization_url);
        Ok(())
    }

    async fn save_code_verifier(&self, code_verifier: String) -> Result<(), AuthError> {
        *self.verifier.lock().unwrap() = Some(code_verifier);
        Ok(())
    }

    async fn code_verifier(&self) -> Result<String, AuthError> {
        self.verifier
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AuthError::Provider("no code verifier saved".into()))
    }

    fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    fn client_metadata(&self) -> &OAuthClientMetadata {
        &self.metadata
    }

    async fn client_information(&self) -> Result<Option<OAuthClientInformation>, AuthError> {
        Ok(self.client.lock().unwrap().clone())
    }

    fn can_save_client_information(&self) -> bool {
        self.saveable
    }

    async fn save_client_information(
        &self,
        information: OAuthClientInformationFull,
    ) -> Result<(), AuthError> {
        *self.client.lock().unwrap() = Some(information.information);
        Ok(())
    }

    async fn invalidate_credentials(&self, scope: InvalidationScope) -> Result<(), AuthError> {
        self.invalidations.lock().unwrap().push(scope);
        match scope {
            InvalidationScope::All => {
                *self.tokens.lock().unwrap() = None;
                *self.client.lock().unwrap() = None;
                *self.verifier.lock().unwrap() = None;
            }
            InvalidationScope::Client => *self.client.lock().unwrap() = None,
            InvalidationScope::Tokens => *self.tokens.lock().unwrap() = None,
            InvalidationScope::Verifier => *self.verifier.lock().unwrap() = None,
        }
        Ok(())
    }
}
