//! Integration tests for MCP protocol handling and tool dispatch.
//!
//! These tests verify JSON-RPC 2.0 parsing, the dispatcher's validation and
//! error mapping, and the per-session protocol instance.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use pizzaz_mcp::error::{DispatchError, HandlerError};
use pizzaz_mcp::mcp::catalog::Catalog;
use pizzaz_mcp::mcp::dispatch::Dispatcher;
use pizzaz_mcp::mcp::protocol::{parse_message, IncomingMessage, OutgoingMessage, RequestId};
use pizzaz_mcp::mcp::resources::ResourceCatalog;
use pizzaz_mcp::mcp::schema::{Constraint, FieldSpec, InputShape, ValidatedArgs};
use pizzaz_mcp::mcp::server::McpServer;
use pizzaz_mcp::mcp::tools::{
    ToolContent, ToolDefinition, ToolOutput, ToolRegistration, ToolRegistry,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Registers `echo-state`, which echoes a normalised two-letter state behind
/// `label` and counts its invocations.
fn echo_state(calls: &Arc<AtomicUsize>, label: &str) -> ToolRegistration {
    let counter = Arc::clone(calls);
    let prefix = label.to_string();
    let state = FieldSpec::string()
        .required()
        .trimmed()
        .length(2, 2)
        .pattern("^[A-Za-z]{2}$")
        .unwrap()
        .uppercase();

    ToolRegistration {
        tool: ToolDefinition {
            name: "echo-state".to_string(),
            title: Some("Echo state".to_string()),
            description: Some("Echoes a state code".to_string()),
            input_schema: InputShape::new().field("state", state),
            meta: None,
        },
        handler: Arc::new(move |args: &ValidatedArgs| {
            counter.fetch_add(1, Ordering::SeqCst);
            let state = args.str("state").unwrap_or_default();
            let mut structured = Map::new();
            structured.insert("state".into(), json!(state));
            Ok::<_, HandlerError>(
                ToolOutput::structured(structured).with_text(format!("{prefix} {state}")),
            )
        }),
        default_response_text: "Echo complete.".to_string(),
        default_meta: None,
    }
}

fn failing_tool() -> ToolRegistration {
    ToolRegistration {
        tool: ToolDefinition {
            name: "always-fails".to_string(),
            title: None,
            description: None,
            input_schema: InputShape::new(),
            meta: None,
        },
        handler: Arc::new(|_: &ValidatedArgs| {
            Err::<ToolOutput, _>(HandlerError::new(
                "look up",
                "XX",
                std::io::Error::other("upstream unavailable"),
            ))
        }),
        default_response_text: "unused".to_string(),
        default_meta: None,
    }
}

fn catalog(calls: &Arc<AtomicUsize>) -> Arc<Catalog> {
    let mut tools = ToolRegistry::new();
    tools.register(echo_state(calls, "Echoed"));
    tools.register(failing_tool());
    Arc::new(Catalog::new(tools, ResourceCatalog::new()))
}

fn request(id: i64, method: &str, params: Value) -> IncomingMessage {
    let json = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
    parse_message(&json.to_string()).unwrap()
}

fn result_of(message: Option<OutgoingMessage>) -> Value {
    match message {
        Some(OutgoingMessage::Response(response)) => response.result,
        other => panic!("Expected success response, got {other:?}"),
    }
}

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn test_parse_initialize_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {
                "name": "test-client",
                "version": "1.0.0"
            }
        }
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Request(req) = result.unwrap() {
        assert_eq!(req.method, "initialize");
        assert_eq!(req.id, RequestId::Number(1));
    } else {
        panic!("Expected Request");
    }
}

#[test]
fn test_parse_notification() {
    let json = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/initialized"
    }"#;

    let result = parse_message(json);
    assert!(result.is_ok());

    if let IncomingMessage::Notification(notif) = result.unwrap() {
        assert_eq!(notif.method, "notifications/initialized");
    } else {
        panic!("Expected Notification");
    }
}

#[test]
fn test_parse_invalid_json() {
    let result = parse_message("not valid json");
    assert!(result.is_err());
}

#[test]
fn test_parse_wrong_jsonrpc_version() {
    let json = r#"{"jsonrpc": "1.0", "id": 1, "method": "ping"}"#;
    assert!(parse_message(json).is_err());
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[tokio::test]
async fn test_echo_state_normalises_input() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = Dispatcher::new(catalog(&calls));

    let envelope = dispatcher
        .invoke("echo-state", &json!({ "state": "ca" }))
        .await
        .unwrap();

    assert_eq!(envelope.structured_content["state"], "CA");
    assert_eq!(envelope.content, [ToolContent::text("Echoed CA")]);
    assert!(!envelope.is_error);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_arguments_skip_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = Dispatcher::new(catalog(&calls));

    let err = dispatcher
        .invoke("echo-state", &json!({ "state": "California" }))
        .await
        .unwrap_err();

    match err {
        DispatchError::InvalidArguments { tool, source } => {
            assert_eq!(tool, "echo-state");
            assert_eq!(source.field, "state");
            assert_eq!(source.constraint, Constraint::MaxLength(2));
        }
        other => panic!("Expected InvalidArguments, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_tool_skips_handlers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = Dispatcher::new(catalog(&calls));

    let err = dispatcher.invoke("nonexistent", &json!({})).await.unwrap_err();

    assert!(matches!(err, DispatchError::ToolNotFound { ref name } if name == "nonexistent"));
    assert_eq!(err.to_string(), "Unknown tool: nonexistent");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_failure_keeps_cause() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = Dispatcher::new(catalog(&calls));

    let err = dispatcher.invoke("always-fails", &Value::Null).await.unwrap_err();

    assert!(matches!(err, DispatchError::HandlerFailed { .. }));
    assert!(err.to_string().contains("upstream unavailable"));
}

#[tokio::test]
async fn test_last_registration_wins() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut tools = ToolRegistry::new();
    tools.register(echo_state(&calls, "first"));
    tools.register(failing_tool());
    tools.register(echo_state(&calls, "second"));
    let dispatcher = Dispatcher::new(Arc::new(Catalog::new(tools, ResourceCatalog::new())));

    let envelope = dispatcher
        .invoke("echo-state", &json!({ "state": "tx" }))
        .await
        .unwrap();
    assert_eq!(envelope.content, [ToolContent::text("second TX")]);

    let names: Vec<_> = dispatcher
        .catalog()
        .tools
        .list()
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(names, ["echo-state", "always-fails"]);
}

// =============================================================================
// Session Protocol Tests
// =============================================================================

#[tokio::test]
async fn test_initialize_negotiates_version() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut server = McpServer::new(catalog(&calls));

    let result = result_of(
        server
            .handle_message(request(
                1,
                "initialize",
                json!({ "protocolVersion": "2024-11-05", "capabilities": {} }),
            ))
            .await,
    );
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "pizzaz-mcp");
    assert!(result["capabilities"]["tools"].is_object());
    assert!(result["capabilities"]["resources"].is_object());

    let second = server
        .handle_message(request(
            2,
            "initialize",
            json!({ "protocolVersion": "2024-11-05", "capabilities": {} }),
        ))
        .await;
    assert!(matches!(second, Some(OutgoingMessage::Error(_))));
}

#[tokio::test]
async fn test_unsupported_version_gets_latest() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut server = McpServer::new(catalog(&calls));

    let result = result_of(
        server
            .handle_message(request(
                1,
                "initialize",
                json!({ "protocolVersion": "1999-01-01", "capabilities": {} }),
            ))
            .await,
    );
    assert_eq!(result["protocolVersion"], "2025-06-18");
}

#[tokio::test]
async fn test_tool_call_failure_is_error_envelope() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut server = McpServer::new(catalog(&calls));

    let result = result_of(
        server
            .handle_message(request(
                3,
                "tools/call",
                json!({ "name": "nonexistent", "arguments": {} }),
            ))
            .await,
    );

    assert_eq!(result["isError"], true);
    assert_eq!(result["content"][0]["text"], "Unknown tool: nonexistent");
}

#[tokio::test]
async fn test_tool_call_success_envelope() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut server = McpServer::new(catalog(&calls));

    let result = result_of(
        server
            .handle_message(request(
                4,
                "tools/call",
                json!({ "name": "echo-state", "arguments": { "state": " ny " } }),
            ))
            .await,
    );

    assert_eq!(result["structuredContent"], json!({ "state": "NY" }));
    assert_eq!(result["content"], json!([{ "type": "text", "text": "Echoed NY" }]));
    assert!(result.get("isError").is_none());
    assert!(result.get("_meta").is_none());
}

#[tokio::test]
async fn test_unknown_resource_is_protocol_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut server = McpServer::new(catalog(&calls));

    let response = server
        .handle_message(request(5, "resources/read", json!({ "uri": "ui://missing" })))
        .await;

    match response {
        Some(OutgoingMessage::Error(error)) => assert_eq!(error.error.code, -32002),
        other => panic!("Expected error response, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_method() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut server = McpServer::new(catalog(&calls));

    let response = server.handle_message(request(6, "prompts/list", json!({}))).await;

    match response {
        Some(OutgoingMessage::Error(error)) => assert_eq!(error.error.code, -32601),
        other => panic!("Expected error response, got {other:?}"),
    }
}

#[tokio::test]
async fn test_listings_are_stable() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut server = McpServer::new(catalog(&calls));

    for method in ["tools/list", "resources/list", "resources/templates/list"] {
        let first = result_of(server.handle_message(request(8, method, json!({}))).await);
        let second = result_of(server.handle_message(request(8, method, json!({}))).await);
        assert_eq!(first, second, "{method} changed between calls");
    }
}
