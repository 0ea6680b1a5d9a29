// ABOUTME: Tests for the MCP tool surface and its transports.
// ABOUTME: Drives JSON-RPC requests through handle_request, the HTTP router and the stdio loop.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bcbot::config::BotDefaults;
use bcbot::mcp::{
    call_tool, handle_request, handle_text, tool_definitions, JsonRpcRequest, McpState,
};
use bcbot::{server, stdio};
use bcbot_client::{ClientError, RoomSummary};
use bcbot_core::{CommandDispatcher, MockClient, SessionController, SessionSettings};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

struct Harness {
    state: McpState,
    mock: MockClient,
    _dir: TempDir,
}

fn harness(mock: MockClient) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut file = std::fs::File::create(dir.path().join("chatroom_config.json")).unwrap();
    file.write_all(br#"{"Name": "Den", "Description": "bot den", "Limit": 8}"#)
        .unwrap();

    let controller = SessionController::new(
        Arc::new(mock.clone()),
        SessionSettings {
            start_timeout: Duration::from_millis(500),
            disconnect_timeout: Duration::from_millis(200),
            event_capacity: 20,
        },
    );
    let dispatcher = CommandDispatcher::new(controller.clone(), Duration::from_millis(200));
    let defaults = BotDefaults {
        username: Some("bot".to_string()),
        password: Some("pw".to_string()),
        base_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };

    Harness {
        state: McpState::new(controller, dispatcher, defaults),
        mock,
        _dir: dir,
    }
}

fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
    serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    }))
    .unwrap()
}

/// Call a tool and return its tools/call result object
async fn call(state: &McpState, name: &str, arguments: Value) -> Value {
    let response = handle_request(
        state,
        request(1, "tools/call", json!({ "name": name, "arguments": arguments })),
    )
    .await
    .unwrap();
    assert!(response.error.is_none(), "{:?}", response.error);
    response.result.unwrap()
}

fn error_kind(result: &Value) -> &str {
    assert_eq!(result["isError"], true, "expected a tool error: {}", result);
    result["structuredContent"]["error"]["kind"]
        .as_str()
        .unwrap()
}

#[tokio::test]
async fn test_initialize_and_tools_list() {
    let h = harness(MockClient::new());

    let response = handle_request(&h.state, request(1, "initialize", json!({})))
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "bcbot");
    assert!(result["capabilities"]["tools"].is_object());

    let response = handle_request(&h.state, request(2, "tools/list", json!({})))
        .await
        .unwrap();
    assert_eq!(response.id, json!(2));
    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 14);
    assert_eq!(tools.len(), tool_definitions().len());
    for tool in &tools {
        assert!(tool["inputSchema"].is_object(), "{}", tool["name"]);
    }
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert!(names.contains(&"start_bot"));
    assert!(names.contains(&"get_room_member_detail"));
}

#[tokio::test]
async fn test_protocol_errors() {
    let h = harness(MockClient::new());

    let response = handle_request(&h.state, request(3, "resources/list", json!({})))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32601);

    let response = handle_request(
        &h.state,
        request(4, "tools/call", json!({ "name": "launch_rocket" })),
    )
    .await
    .unwrap();
    assert_eq!(response.error.unwrap().code, -32602);

    let response = handle_text(&h.state, "{ not json").await.unwrap();
    assert_eq!(response.error.unwrap().code, -32700);
    assert_eq!(response.id, Value::Null);

    let response = handle_text(&h.state, r#"{"jsonrpc": "1.0", "id": 5, "method": "ping"}"#)
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32600);
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let h = harness(MockClient::new());
    let response = handle_text(
        &h.state,
        r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#,
    )
    .await;
    assert!(response.is_none());
}

#[tokio::test]
async fn test_commands_before_start_report_not_connected() {
    let h = harness(MockClient::new());

    let result = call(&h.state, "send_chat_message", json!({ "text": "hi" })).await;
    assert_eq!(error_kind(&result), "not_connected");
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .starts_with("not_connected: "));

    let status = call(&h.state, "get_bot_status", json!({})).await;
    assert_eq!(status["structuredContent"]["state"], "stopped");
    assert_eq!(status["structuredContent"]["running"], false);
    assert_eq!(h.mock.connect_count(), 0);
}

#[tokio::test]
async fn test_bot_session_through_tools() {
    let h = harness(
        MockClient::new()
            .with_player(5, "Helper")
            .with_room(RoomSummary::new("Lounge")),
    );

    let started = call(&h.state, "start_bot", json!({})).await;
    assert!(started.get("isError").is_none(), "{}", started);
    assert_eq!(started["structuredContent"]["status"]["state"], "running");
    assert_eq!(
        started["structuredContent"]["status"]["session"]["chatroom"],
        "Den"
    );

    let again = call(&h.state, "start_bot", json!({})).await;
    assert_eq!(error_kind(&again), "already_active");

    let sent = call(&h.state, "send_chat_message", json!({ "text": "hello" })).await;
    assert!(sent.get("isError").is_none(), "{}", sent);
    assert_eq!(h.mock.sent_messages(), vec!["hello".to_string()]);

    let joined = call(&h.state, "join_chatroom", json!({ "id": "Lounge" })).await;
    assert_eq!(joined["structuredContent"]["chatroom"]["name"], "Lounge");
    let current = call(&h.state, "get_current_chatroom", json!({})).await;
    assert_eq!(current["structuredContent"]["chatroom"]["name"], "Lounge");

    for _ in 0..200 {
        if h.state.controller.buffer().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let events = call(&h.state, "get_recent_events", json!({})).await;
    let listed = events["structuredContent"]["events"].as_array().unwrap();
    assert!(!listed.is_empty());
    assert!(listed
        .windows(2)
        .all(|w| w[0]["sequence"].as_u64() < w[1]["sequence"].as_u64()));

    let bad = call(&h.state, "get_recent_events", json!({ "limit": 0 })).await;
    assert_eq!(error_kind(&bad), "invalid_argument");

    let stopped = call(&h.state, "stop_bot", json!({})).await;
    assert_eq!(stopped["structuredContent"]["status"]["state"], "stopped");
    let stopped_again = call(&h.state, "stop_bot", json!({})).await;
    assert!(stopped_again.get("isError").is_none());
}

#[tokio::test]
async fn test_bad_arguments_are_invalid_argument() {
    let h = harness(MockClient::new());
    call(&h.state, "start_bot", json!({})).await;

    let result = call(&h.state, "query_account", json!({ "member_number": "seven" })).await;
    assert_eq!(error_kind(&result), "invalid_argument");

    let result = call(&h.state, "create_chatroom", json!({ "name": "Den", "limit": 50 })).await;
    assert_eq!(error_kind(&result), "invalid_argument");

    let result = call(
        &h.state,
        "start_bot",
        json!({ "chatroom_config_path": "missing.json" }),
    )
    .await;
    // The session is already running, so the start is refused before the file is read
    assert_eq!(error_kind(&result), "already_active");
}

#[tokio::test]
async fn test_command_outliving_its_session_carries_warning() {
    let h = harness(MockClient::new().delay("query_account", Duration::from_millis(100)));
    call(&h.state, "start_bot", json!({})).await;

    let in_flight = {
        let state = h.state.clone();
        tokio::spawn(async move {
            call_tool(&state, "query_account", json!({ "member_number": 1 })).await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.state.controller.stop().await.unwrap();

    let value = in_flight.await.unwrap().unwrap();
    assert_eq!(value["account"]["MemberNumber"], 1);
    assert!(value["warning"].as_str().unwrap().contains("session ended"));

    // Commands on a live session carry no warning
    call(&h.state, "start_bot", json!({})).await;
    let value = call_tool(&h.state, "query_account", json!({ "member_number": 1 }))
        .await
        .unwrap();
    assert!(value.get("warning").is_none());
}

#[tokio::test]
async fn test_start_failure_reports_connection_failed() {
    let h = harness(
        MockClient::new().fail_connect(ClientError::AuthRejected("bad password".to_string())),
    );

    let result = call(&h.state, "start_bot", json!({})).await;
    assert_eq!(error_kind(&result), "connection_failed");

    let status = call(&h.state, "get_bot_status", json!({})).await;
    assert_eq!(status["structuredContent"]["state"], "error");
    assert_eq!(
        status["structuredContent"]["last_error"]["kind"],
        "connection_failed"
    );
}

#[tokio::test]
async fn test_http_router_serves_mcp_and_health() {
    let h = harness(MockClient::new());
    let app = server::router(Arc::new(h.state.clone()), "/mcp", None);

    let body = json!({ "jsonrpc": "2.0", "id": 7, "method": "tools/list" }).to_string();
    let response = app
        .clone()
        .oneshot(
            Request::post("/mcp")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["id"], 7);
    assert_eq!(value["result"]["tools"].as_array().unwrap().len(), 14);

    let notification =
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }).to_string();
    let response = app
        .clone()
        .oneshot(
            Request::post("/mcp")
                .header("content-type", "application/json")
                .body(Body::from(notification))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["bot"]["state"], "stopped");
    assert_eq!(value["bot"]["running"], false);
}

#[tokio::test]
async fn test_stdio_loop_answers_each_request_line() {
    let h = harness(MockClient::new());
    let input = concat!(
        r#"{"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}"#,
        "\n",
        r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#,
        "\n",
        "\n",
        "garbage\n",
        r#"{"jsonrpc": "2.0", "id": 2, "method": "ping"}"#,
        "\n",
    );
    let mut output = Vec::new();

    stdio::serve_lines(&h.state, input.as_bytes(), &mut output)
        .await
        .unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[1]["error"]["code"], -32700);
    assert_eq!(lines[2]["id"], 2);
    assert!(lines[2]["result"].is_object());
}
