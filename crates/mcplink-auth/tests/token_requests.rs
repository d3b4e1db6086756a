//! Token endpoint and dynamic client registration integration tests

mod common;

use common::{MockOAuth2Server, REDIRECT_URL, form_params};
use mcplink_auth::{
    AuthError, AuthorizationServerMetadata, OAuthClientInformation, OAuthClientMetadata, SafeUrl,
    TokenRequest, default_http_client, exchange_authorization, refresh_authorization,
    register_client,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn metadata(mock: &MockOAuth2Server, extra: serde_json::Value) -> AuthorizationServerMetadata {
    let mut raw = mock.metadata_json();
    if let (Some(target), Some(extra)) = (raw.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            target.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(raw).unwrap()
}

#[tokio::test]
async fn test_exchange_without_metadata_uses_default_endpoint() {
    let mock = MockOAuth2Server::start().await;
    mock.mock_token_success("access-1", Some("refresh-1")).await;

    let http = default_http_client().unwrap();
    let server = mock.url("/");
    let client = OAuthClientInformation::public("client-1");
    let resource = Url::parse("https://api.example.com/mcp").unwrap();
    let request = TokenRequest::new(&server, &client).with_resource(Some(&resource));

    let tokens = exchange_authorization(
        &http,
        &request,
        "code-123",
        "verifier-xyz",
        &Url::parse(REDIRECT_URL).unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(tokens.access_token, "access-1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));

    let hits = mock.hits("/token").await;
    assert_eq!(hits.len(), 1);
    let params = form_params(&hits[0]);
    assert_eq!(param(&params, "grant_type"), Some("authorization_code"));
    assert_eq!(param(&params, "code"), Some("code-123"));
    assert_eq!(param(&params, "code_verifier"), Some("verifier-xyz"));
    assert_eq!(param(&params, "redirect_uri"), Some(REDIRECT_URL));
    assert_eq!(param(&params, "client_id"), Some("client-1"));
    assert_eq!(param(&params, "resource"), Some("https://api.example.com/mcp"));
    assert!(hits[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_exchange_uses_basic_auth_when_supported() {
    let mock = MockOAuth2Server::start().await;
    mock.mock_token_success("access-1", None).await;

    let http = default_http_client().unwrap();
    let server = mock.url("/");
    let metadata = metadata(
        &mock,
        json!({"token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"]}),
    );
    let client = OAuthClientInformation::confidential("client", "secret");
    let request = TokenRequest::new(&server, &client).with_metadata(Some(&metadata));

    exchange_authorization(
        &http,
        &request,
        "code",
        "verifier",
        &Url::parse(REDIRECT_URL).unwrap(),
    )
    .await
    .unwrap();

    let hits = mock.hits("/token").await;
    assert_eq!(
        hits[0].headers.get("authorization").unwrap(),
        "Basic Y2xpZW50OnNlY3JldA=="
    );
    let params = form_params(&hits[0]);
    assert_eq!(param(&params, "client_id"), None);
    assert_eq!(param(&params, "client_secret"), None);
}

#[tokio::test]
async fn test_refresh_keeps_original_refresh_token() {
    let mock = MockOAuth2Server::start().await;
    mock.mock_token_success("access-2", None).await;

    let http = default_http_client().unwrap();
    let server = mock.url("/");
    let client = OAuthClientInformation::confidential("client", "secret");
    let request = TokenRequest::new(&server, &client);

    let tokens = refresh_authorization(&http, &request, "refresh-1")
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "access-2");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));

    let params = form_params(&mock.hits("/token").await[0]);
    assert_eq!(param(&params, "grant_type"), Some("refresh_token"));
    assert_eq!(param(&params, "refresh_token"), Some("refresh-1"));
    assert_eq!(param(&params, "client_secret"), Some("secret"));
}

#[tokio::test]
async fn test_refresh_rejects_unsupported_grant() {
    let mock = MockOAuth2Server::start().await;

    let http = default_http_client().unwrap();
    let server = mock.url("/");
    let metadata = metadata(&mock, json!({"grant_types_supported": ["authorization_code"]}));
    let client = OAuthClientInformation::public("client");
    let request = TokenRequest::new(&server, &client).with_metadata(Some(&metadata));

    let err = refresh_authorization(&http, &request, "refresh-1")
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Incompatible auth server: does not support grant type refresh_token"
    );
    assert!(mock.hits("/token").await.is_empty());
}

#[tokio::test]
async fn test_token_error_is_typed() {
    let mock = MockOAuth2Server::start().await;
    mock.mock_token_error("invalid_grant", "refresh token revoked")
        .await;

    let http = default_http_client().unwrap();
    let server = mock.url("/");
    let client = OAuthClientInformation::public("client");
    let request = TokenRequest::new(&server, &client);

    let err = refresh_authorization(&http, &request, "refresh-1")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AuthError::InvalidGrant {
            description: "refresh token revoked".into(),
            uri: None
        }
    );
}

#[tokio::test]
async fn test_register_client() {
    let mock = MockOAuth2Server::start().await;
    mock.mock_registration("registered-1").await;

    let http = default_http_client().unwrap();
    let client_metadata =
        OAuthClientMetadata::new("mcplink-test", SafeUrl::parse(REDIRECT_URL).unwrap());
    let full = register_client(&http, &mock.url("/"), None, &client_metadata)
        .await
        .unwrap();

    assert_eq!(full.information.client_id, "registered-1");
    assert_eq!(full.information.client_id_issued_at, Some(1_700_000_000));

    let hits = mock.hits("/register").await;
    let body: serde_json::Value = serde_json::from_slice(&hits[0].body).unwrap();
    assert_eq!(body["client_name"], "mcplink-test");
    assert_eq!(body["redirect_uris"], json!([REDIRECT_URL]));
}

#[tokio::test]
async fn test_register_client_requires_endpoint_in_metadata() {
    let mock = MockOAuth2Server::start().await;

    let http = default_http_client().unwrap();
    let mut metadata = metadata(&mock, json!({}));
    metadata.registration_endpoint = None;
    let client_metadata =
        OAuthClientMetadata::new("mcplink-test", SafeUrl::parse(REDIRECT_URL).unwrap());

    let err = register_client(&http, &mock.url("/"), Some(&metadata), &client_metadata)
        .await
        .unwrap_err();

    assert_eq!(err, AuthError::RegistrationUnsupported);
    assert!(mock.hits("/register").await.is_empty());
}
