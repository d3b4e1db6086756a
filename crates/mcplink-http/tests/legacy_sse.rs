//! Legacy HTTP+SSE transport tests
//!
//! wiremock closes every response once its body is written, so the
//! long-lived stream needed for a full round trip is served by a small
//! hand-written HTTP server.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use common::*;
use mcplink_http::{
    SseTransport, SseTransportConfig, Transport, TransportError, TransportEvent,
    TransportEventSender, TransportState,
};
use mcplink_protocol::{JsonRpcMessage, JsonRpcRequest};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

/// Serves `GET /sse` as an open event stream announcing `/messages`, and
/// echoes every POST body back on the stream as a `message` event.
async fn spawn_legacy_server(post_status: u16) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (posts_tx, posts_rx) = mpsc::unbounded_channel();
    let (stream_tx, _) = broadcast::channel::<String>(16);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(handle_connection(
                socket,
                posts_tx.clone(),
                stream_tx.clone(),
                post_status,
            ));
        }
    });

    (addr, posts_rx)
}

async fn handle_connection(
    mut socket: TcpStream,
    posts: mpsc::UnboundedSender<String>,
    stream: broadcast::Sender<String>,
    post_status: u16,
) {
    let (head, body) = read_request(&mut socket).await;

    if head.starts_with("GET") {
        let mut events = stream.subscribe();
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\r\n")
            .await;
        let _ = socket
            .write_all(b"event: endpoint\ndata: /messages?sessionId=abc\n\n")
            .await;
        while let Ok(event) = events.recv().await {
            if socket.write_all(event.as_bytes()).await.is_err() {
                break;
            }
        }
    } else {
        let _ = stream.send(format!("event: message\ndata: {body}\n\n"));
        let _ = posts.send(body);
        let response =
            format!("HTTP/1.1 {post_status} Status\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        let _ = socket.write_all(response.as_bytes()).await;
    }
}

async fn read_request(socket: &mut TcpStream) -> (String, String) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
            let length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);

            let mut body = buf[pos + 4..].to_vec();
            while body.len() < length {
                let n = socket.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&chunk[..n]);
            }
            return (head, String::from_utf8_lossy(&body).to_string());
        }

        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return (String::from_utf8_lossy(&buf).to_string(), String::new());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Same-origin OAuth endpoints in front of the legacy stream. `/messages`
/// answers 401 to `Bearer access-1`, or to every token when `reject_all` is
/// set. Each request line is reported on the returned channel.
async fn spawn_protected_server(reject_all: bool) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (log_tx, log_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(handle_protected(socket, addr, log_tx.clone(), reject_all));
        }
    });

    (addr, log_rx)
}

async fn handle_protected(
    mut socket: TcpStream,
    addr: SocketAddr,
    log: mpsc::UnboundedSender<String>,
    reject_all: bool,
) {
    let (head, _body) = read_request(&mut socket).await;
    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let path = target.split('?').next().unwrap_or_default().to_string();
    let _ = log.send(format!("{method} {path}"));

    let base = format!("http://{addr}");
    let response = match (method.as_str(), path.as_str()) {
        ("GET", "/sse") => {
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\r\n")
                .await;
            let _ = socket
                .write_all(b"event: endpoint\ndata: /messages?sessionId=abc\n\n")
                .await;
            // hold the stream open until the client goes away
            let mut sink = [0u8; 64];
            let _ = socket.read(&mut sink).await;
            return;
        }
        ("GET", "/.well-known/oauth-protected-resource") => json_response(json!({
            "resource": format!("{base}/sse"),
            "authorization_servers": [base],
        })),
        ("GET", "/.well-known/oauth-authorization-server") => json_response(json!({
            "issuer": base,
            "authorization_endpoint": format!("{base}/authorize"),
            "token_endpoint": format!("{base}/token"),
            "response_types_supported": ["code"],
            "code_challenge_methods_supported": ["S256"],
        })),
        ("POST", "/token") => json_response(json!({
            "access_token": "access-2",
            "token_type": "Bearer",
        })),
        ("POST", "/messages") => {
            let stale = head
                .to_ascii_lowercase()
                .contains("authorization: bearer access-1");
            if reject_all || stale {
                format!(
                    "HTTP/1.1 401 Unauthorized\r\nwww-authenticate: Bearer resource_metadata=\"{base}/.well-known/oauth-protected-resource\"\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                )
            } else {
                "HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_string()
            }
        }
        _ => "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_string(),
    };
    let _ = socket.write_all(response.as_bytes()).await;
}

fn json_response(body: serde_json::Value) -> String {
    let body = body.to_string();
    format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn drain(log: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = log.try_recv() {
        lines.push(line);
    }
    lines
}

#[tokio::test]
async fn test_round_trip_through_announced_endpoint() {
    let (addr, mut posts) = spawn_legacy_server(200).await;
    let transport = SseTransport::new(SseTransportConfig::new(format!("http://{addr}/sse"))).unwrap();
    let (events, mut rx) = TransportEventSender::channel();

    transport.start(events).await.unwrap();
    assert_eq!(transport.state(), TransportState::Active);
    assert_eq!(
        transport.message_endpoint().unwrap().as_str(),
        format!("http://{addr}/messages?sessionId=abc")
    );

    let request: JsonRpcMessage = JsonRpcRequest::new("ping", None, 1i64).into();
    transport.send(request.clone()).await.unwrap();

    let posted: serde_json::Value = serde_json::from_str(&posts.recv().await.unwrap()).unwrap();
    assert_eq!(posted, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
    assert_eq!(next_event(&mut rx).await, TransportEvent::Message(request));

    transport.close().await.unwrap();
    assert_eq!(next_event(&mut rx).await, TransportEvent::Closed);
    assert_eq!(
        transport
            .send(JsonRpcRequest::new("ping", None, 2i64).into())
            .await
            .unwrap_err(),
        TransportError::NotConnected
    );
}

#[tokio::test]
async fn test_post_failure_is_reported() {
    let (addr, _posts) = spawn_legacy_server(500).await;
    let transport = SseTransport::new(SseTransportConfig::new(format!("http://{addr}/sse"))).unwrap();
    let (events, _rx) = TransportEventSender::channel();
    transport.start(events).await.unwrap();

    let err = transport
        .send(JsonRpcRequest::new("ping", None, 1i64).into())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "POSTing to endpoint (HTTP 500): ");
}

#[tokio::test]
async fn test_connection_requires_200() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = SseTransport::new(SseTransportConfig::new(format!("{}/sse", server.uri()))).unwrap();
    let (events, mut rx) = TransportEventSender::channel();

    let err = transport.start(events).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(next_event(&mut rx).await, TransportEvent::Error(err));
}

#[tokio::test]
async fn test_endpoint_must_share_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(sse_response("event: endpoint\ndata: http://example.com/messages\n\n"))
        .mount(&server)
        .await;

    let transport = SseTransport::new(SseTransportConfig::new(format!("{}/sse", server.uri()))).unwrap();
    let (events, _rx) = TransportEventSender::channel();

    let err = transport.start(events).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Connection failed: Endpoint origin does not match connection origin: http://example.com"
    );
    assert!(transport.message_endpoint().is_none());
}

#[tokio::test]
async fn test_stream_end_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(sse_response("event: endpoint\ndata: /messages\n\n"))
        .mount(&server)
        .await;

    let transport = SseTransport::new(SseTransportConfig::new(format!("{}/sse", server.uri()))).unwrap();
    let (events, mut rx) = TransportEventSender::channel();
    transport.start(events).await.unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        TransportEvent::Error(TransportError::ConnectionLost(
            "Connection closed unexpectedly".into()
        ))
    );
    assert_eq!(
        transport
            .send(JsonRpcRequest::new("ping", None, 1i64).into())
            .await
            .unwrap_err(),
        TransportError::NotConnected
    );

    let gets = wait_for_requests(&server, "GET", 1).await;
    assert_eq!(gets.len(), 1);
}

#[tokio::test]
async fn test_stream_without_endpoint_fails_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(sse_response(": nothing to see\n\n"))
        .mount(&server)
        .await;

    let transport = SseTransport::new(SseTransportConfig::new(format!("{}/sse", server.uri()))).unwrap();
    let (events, _rx) = TransportEventSender::channel();

    let err = transport.start(events).await.unwrap_err();
    assert!(matches!(err, TransportError::ConnectionLost(_)));
}

#[tokio::test]
async fn test_post_unauthorized_reauthorizes_once_and_replays() {
    let (addr, mut log) = spawn_protected_server(false).await;
    let provider = Arc::new(TestProvider::with_access_token("access-1"));
    let transport = SseTransport::new(
        SseTransportConfig::new(format!("http://{addr}/sse")).with_auth_provider(provider.clone()),
    )
    .unwrap();
    let (events, _rx) = TransportEventSender::channel();
    transport.start(events).await.unwrap();

    transport
        .send(JsonRpcRequest::new("ping", None, 1i64).into())
        .await
        .unwrap();
    assert_eq!(provider.access_token().as_deref(), Some("access-2"));

    let lines = drain(&mut log);
    let count = |line: &str| lines.iter().filter(|l| l.as_str() == line).count();
    assert_eq!(count("POST /messages"), 2);
    assert_eq!(count("POST /token"), 1);
    assert_eq!(count("GET /sse"), 1);
}

#[tokio::test]
async fn test_post_second_unauthorized_is_not_retried() {
    let (addr, mut log) = spawn_protected_server(true).await;
    let provider = Arc::new(TestProvider::with_access_token("access-1"));
    let transport = SseTransport::new(
        SseTransportConfig::new(format!("http://{addr}/sse")).with_auth_provider(provider),
    )
    .unwrap();
    let (events, mut rx) = TransportEventSender::channel();
    transport.start(events).await.unwrap();

    let err = transport
        .send(JsonRpcRequest::new("ping", None, 1i64).into())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransportError::Unauthorized("server rejected the refreshed credentials".into())
    );
    assert_eq!(next_event(&mut rx).await, TransportEvent::Error(err));

    let lines = drain(&mut log);
    let count = |line: &str| lines.iter().filter(|l| l.as_str() == line).count();
    assert_eq!(count("POST /messages"), 2);
    assert_eq!(count("POST /token"), 1);
}

/// Protected resource metadata naming the `/sse` URL, ahead of the `/mcp`
/// one `mock_oauth` mounts.
async fn mock_sse_resource(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-protected-resource"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": format!("{}/sse", server.uri()),
            "authorization_servers": [server.uri()],
        })))
        .with_priority(1)
        .mount(server)
        .await;
}

fn sse_requests(requests: &[wiremock::Request], http_method: &str, p: &str) -> usize {
    requests
        .iter()
        .filter(|r| r.method.as_str() == http_method && r.url.path() == p)
        .count()
}

#[tokio::test]
async fn test_connect_unauthorized_reauthorizes_once() {
    let server = MockServer::start().await;
    mock_sse_resource(&server).await;
    mock_oauth(&server, "access-2").await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(unauthorized(&server))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(sse_response("event: endpoint\ndata: /messages\n\n"))
        .mount(&server)
        .await;

    let provider = Arc::new(TestProvider::with_access_token("access-1"));
    let transport = SseTransport::new(
        SseTransportConfig::new(format!("{}/sse", server.uri())).with_auth_provider(provider.clone()),
    )
    .unwrap();
    let (events, _rx) = TransportEventSender::channel();

    transport.start(events).await.unwrap();
    assert_eq!(provider.access_token().as_deref(), Some("access-2"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(sse_requests(&requests, "GET", "/sse"), 2);
    assert_eq!(sse_requests(&requests, "POST", "/token"), 1);
}

#[tokio::test]
async fn test_connect_second_unauthorized_fails_start() {
    let server = MockServer::start().await;
    mock_sse_resource(&server).await;
    mock_oauth(&server, "access-2").await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(unauthorized(&server))
        .mount(&server)
        .await;

    let provider = Arc::new(TestProvider::with_access_token("access-1"));
    let transport = SseTransport::new(
        SseTransportConfig::new(format!("{}/sse", server.uri())).with_auth_provider(provider),
    )
    .unwrap();
    let (events, mut rx) = TransportEventSender::channel();

    let err = transport.start(events).await.unwrap_err();
    assert_eq!(
        err,
        TransportError::Unauthorized("server rejected the refreshed credentials".into())
    );
    assert_eq!(next_event(&mut rx).await, TransportEvent::Error(err));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(sse_requests(&requests, "GET", "/sse"), 2);
    assert_eq!(sse_requests(&requests, "POST", "/token"), 1);
}
