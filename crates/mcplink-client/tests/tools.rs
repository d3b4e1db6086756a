//! Tool exposure tests against the in-memory mock server

mod common;

use std::collections::HashMap;

use mcplink_client::mock::MockTransport;
use mcplink_client::{
    CancellationToken, Client, ClientConfig, Error, RequestOptions, ToolOutput, ToolSchemas,
    TransportVariant,
};
use mcplink_protocol::JsonRpcMessage;
use mcplink_protocol::types::{CallToolResult, Content, Tool};
use pretty_assertions::assert_eq;
use serde_json::json;

async fn connect(mock: MockTransport) -> Client {
    common::init_tracing();
    Client::connect(ClientConfig::new(TransportVariant::custom(mock)))
        .await
        .unwrap()
}

fn numbered_tools(count: usize) -> Vec<Tool> {
    (0..count)
        .map(|i| Tool::new(format!("tool-{i}"), json!({"type": "object"})))
        .collect()
}

#[tokio::test]
async fn test_default_tools_are_normalized() {
    let client = connect(MockTransport::new()).await;
    let tools = client
        .tools(&ToolSchemas::Automatic, &RequestOptions::default())
        .await
        .unwrap();

    let mut names: Vec<&str> = tools.keys().map(String::as_str).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["mock-tool", "mock-tool-no-args"]);

    assert_eq!(
        tools["mock-tool"].input_schema,
        json!({
            "type": "object",
            "properties": {"foo": {"type": "string"}},
            "additionalProperties": false,
        })
    );
    assert_eq!(
        tools["mock-tool-no-args"].input_schema["properties"],
        json!({})
    );
}

#[tokio::test]
async fn test_explicit_schemas_select_tools() {
    let client = connect(MockTransport::new()).await;
    let schema = json!({"type": "object", "properties": {"foo": {"type": "string", "minLength": 3}}});
    let schemas = ToolSchemas::Explicit(HashMap::from([
        ("mock-tool".to_string(), schema.clone()),
        ("not-on-server".to_string(), json!({})),
    ]));

    let tools = client
        .tools(&schemas, &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools["mock-tool"].input_schema, schema);
}

#[tokio::test]
async fn test_tools_follow_pagination() {
    let mock = MockTransport::new()
        .with_tools(numbered_tools(5))
        .with_page_size(2);
    let handle = mock.handle();
    let client = connect(mock).await;

    let tools = client
        .tools(&ToolSchemas::Automatic, &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(tools.len(), 5);

    let cursors: Vec<Option<serde_json::Value>> = handle
        .sent_messages()
        .into_iter()
        .filter_map(|m| match m {
            JsonRpcMessage::Request(r) if r.method == "tools/list" => {
                Some(r.params.and_then(|p| p.get("cursor").cloned()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(cursors, vec![None, Some(json!("2")), Some(json!("4"))]);
}

#[tokio::test]
async fn test_execute_returns_result() {
    let client = connect(MockTransport::new()).await;
    let tools = client
        .tools(&ToolSchemas::Automatic, &RequestOptions::default())
        .await
        .unwrap();

    let output = tools["mock-tool"]
        .execute(json!({"foo": "bar"}), &RequestOptions::default())
        .await
        .unwrap();
    let ToolOutput::Result(CallToolResult::Content(result)) = output else {
        panic!("expected the full result, got {output:?}");
    };
    assert_eq!(result.content, vec![Content::text("Mock tool call result")]);
    assert!(!result.is_error);
}

#[tokio::test]
async fn test_execute_invalid_inputs() {
    let client = connect(MockTransport::new().fail_on_invalid_tool_params()).await;
    let tools = client
        .tools(&ToolSchemas::Automatic, &RequestOptions::default())
        .await
        .unwrap();

    let err = tools["mock-tool"]
        .execute(json!({"foo": 1}), &RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.rpc_code(), Some(-32602));
    assert_eq!(err.to_string(), "Invalid tool inputs for: mock-tool");
}

#[tokio::test]
async fn test_execute_after_cancel() {
    let client = connect(MockTransport::new()).await;
    let tools = client
        .tools(&ToolSchemas::Automatic, &RequestOptions::default())
        .await
        .unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let err = tools["mock-tool-no-args"]
        .execute(json!({}), &RequestOptions::new().with_cancellation(token))
        .await
        .unwrap_err();
    assert_eq!(err, Error::Aborted);
}

#[tokio::test]
async fn test_server_without_tools() {
    let client = connect(MockTransport::new().with_tools(Vec::new())).await;
    let err = client
        .tools(&ToolSchemas::Automatic, &RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, Error::UnsupportedCapability("tools".into()));
}
