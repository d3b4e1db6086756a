//! Shared helpers for HTTP transport integration tests

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mcplink_auth::{
    AuthError, OAuthClientInformation, OAuthClientMetadata, OAuthClientProvider, OAuthTokens,
    SafeUrl,
};
use mcplink_http::{ReconnectionOptions, TransportEvent};
use serde_json::json;
use tokio::sync::mpsc;
use url::Url;
use wiremock::{
    Mock, MockServer, Request, ResponseTemplate,
    matchers::{method, path},
};

/// Reconnection options fast enough for tests
pub fn fast_reconnection() -> ReconnectionOptions {
    ReconnectionOptions {
        initial_delay: Duration::from_millis(10),
        growth_factor: 1.5,
        max_delay: Duration::from_millis(50),
        max_retries: 2,
    }
}

pub fn sse_body(events: &[(&str, Option<&str>, serde_json::Value)]) -> String {
    let mut body = String::new();
    for (event, id, data) in events {
        if let Some(id) = id {
            body.push_str(&format!("id: {id}\n"));
        }
        body.push_str(&format!("event: {event}\ndata: {data}\n\n"));
    }
    body
}

pub fn sse_response(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into(), "text/event-stream")
}

pub fn json_rpc_result(id: i64, result: serde_json::Value) -> serde_json::Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

/// Answer every inbound GET with 405 so only POST traffic is exercised
pub async fn no_inbound_stream(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(405))
        .with_priority(10)
        .mount(server)
        .await;
}

/// Poll until `server` has received at least `count` requests with `http_method`
pub async fn wait_for_requests(server: &MockServer, http_method: &str, count: usize) -> Vec<Request> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let matching: Vec<Request> = server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == http_method)
            .collect();
        if matching.len() >= count || Instant::now() >= deadline {
            return matching;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn next_event(rx: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

/// Mount protected resource metadata, authorization server metadata and a
/// token endpoint issuing `access_token`
pub async fn mock_oauth(server: &MockServer, access_token: &str) {
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-protected-resource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": format!("{base}/mcp"),
            "authorization_servers": [base],
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-authorization-server"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": base,
            "authorization_endpoint": format!("{base}/authorize"),
            "token_endpoint": format!("{base}/token"),
            "response_types_supported": ["code"],
            "code_challenge_methods_supported": ["S256"],
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
        })))
        .mount(server)
        .await;
}

pub fn unauthorized(server: &MockServer) -> ResponseTemplate {
    ResponseTemplate::new(401).insert_header(
        "www-authenticate",
        format!(
            "Bearer resource_metadata=\"{}/.well-known/oauth-protected-resource\"",
            server.uri()
        )
        .as_str(),
    )
}

/// Provider holding a registered client and refreshable tokens in memory
#[derive(Debug)]
pub struct TestProvider {
    redirect_url: Url,
    metadata: OAuthClientMetadata,
    tokens: Mutex<Option<OAuthTokens>>,
    pub redirects: Mutex<Vec<Url>>,
}

impl TestProvider {
    pub fn with_access_token(access_token: &str) -> Self {
        let redirect = SafeUrl::parse("http://localhost:3000/callback").unwrap();
        Self {
            redirect_url: redirect.as_url().clone(),
            metadata: OAuthClientMetadata::new("mcplink-http-test", redirect),
            tokens: Mutex::new(Some(
                OAuthTokens::bearer(access_token).with_refresh_token("refresh-1"),
            )),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens
            .lock()
            .unwrap()
            .as_ref()
            .map(|t| t.access_token.clone())
    }
}

#[async_trait]
impl OAuthClientProvider for TestProvider {
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

    async fn save_code_verifier(&self, _code_verifier: String) -> Result<(), AuthError> {
        Ok(())
    }

    async fn code_verifier(&self) -> Result<String, AuthError> {
        Err(AuthError::Provider("no code verifier saved".into()))
    }

    fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    fn client_metadata(&self) -> &OAuthClientMetadata {
        &self.metadata
    }

    async fn client_information(&self) -> Result<Option<OAuthClientInformation>, AuthError> {
        Ok(Some(OAuthClientInformation::public("client-1")))
    }
}
