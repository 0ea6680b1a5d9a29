// ABOUTME: MCP (Model Context Protocol) tool surface for the bot session manager
// ABOUTME: JSON-RPC dispatch, tool catalogue, argument parsing and error-to-result mapping

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use bcbot_client::{ClientRegistry, HistoryQuery, RoomParams, RoomQuery};
use bcbot_core::commands::{JoinChatroom, MemberLookup, RecentEventsQuery, SendChatMessage};
use bcbot_core::config::{BotDefaults, Config, StartBotRequest};
use bcbot_core::{metrics, BotError, BotResult, CommandDispatcher, SessionController};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "bcbot";

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

/// MCP server state shared with handlers
#[derive(Clone)]
pub struct McpState {
    pub controller: SessionController,
    pub dispatcher: CommandDispatcher,
    pub defaults: Arc<BotDefaults>,
}

impl std::fmt::Debug for McpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpState")
            .field("controller", &self.controller)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl McpState {
    pub fn new(controller: SessionController, dispatcher: CommandDispatcher, defaults: BotDefaults) -> Self {
        Self {
            controller,
            dispatcher,
            defaults: Arc::new(defaults),
        }
    }

    /// Build the session manager from config, picking the chat client from the registry
    pub fn from_config(config: &Config, registry: &ClientRegistry) -> Result<Self> {
        let client = registry.create_from_config(&config.client)?;
        tracing::info!(client = client.name(), "Chat client selected");
        let controller = SessionController::new(client, config.session_settings());
        let dispatcher = CommandDispatcher::new(controller.clone(), config.command_timeout());
        Ok(Self::new(controller, dispatcher, config.bot.clone()))
    }

    /// Stop the bot before the process exits
    pub async fn shutdown(&self) {
        if let Err(e) = self.controller.stop().await {
            tracing::warn!(error = %e, "Failed to stop bot during shutdown");
        }
    }
}

/// JSON-RPC request structure
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC response structure
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Tool definition for MCP
#[derive(Debug, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn no_args() -> Value {
    json!({ "type": "object", "properties": {} })
}

fn member_number_args(what: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "member_number": {
                "type": "integer",
                "description": format!("Member number of the {}", what)
            }
        },
        "required": ["member_number"]
    })
}

/// The tool catalogue served by tools/list
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "start_bot",
            "Connect the bot and enter the configured chatroom. Empty credentials fall back to BC_USERNAME/BC_PASSWORD/APPEARANCE_CODE.",
            json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string" },
                    "password": { "type": "string" },
                    "chatroom_config_path": {
                        "type": "string",
                        "description": "JSON chatroom settings file (default chatroom_config.json)"
                    },
                    "appearance_code": { "type": "string" },
                    "server_url": { "type": "string" },
                    "origin": { "type": "string" }
                }
            }),
        ),
        tool("stop_bot", "Disconnect the bot. Succeeds when already stopped.", no_args()),
        tool(
            "get_bot_status",
            "Session state, logged-in player, current chatroom and its members, last error.",
            no_args(),
        ),
        tool(
            "send_chat_message",
            "Send a chat message to the current chatroom.",
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Message text (max 1000 characters)" }
                },
                "required": ["text"]
            }),
        ),
        tool(
            "get_recent_events",
            "Events received by the bot, oldest first. Without `since` returns the most recent `limit`; with `since` returns the next `limit` events after that sequence number.",
            json!({
                "type": "object",
                "properties": {
                    "since": { "type": "integer", "minimum": 0 },
                    "limit": { "type": "integer", "minimum": 1 }
                }
            }),
        ),
        tool(
            "search_chatrooms",
            "Search public chatrooms by name.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "include_full": { "type": "boolean" }
                }
            }),
        ),
        tool(
            "create_chatroom",
            "Create a chatroom and enter it.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "maxLength": 20 },
                    "description": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 2, "maximum": 20 },
                    "private": { "type": "boolean" },
                    "locked": { "type": "boolean" },
                    "background": { "type": "string" }
                },
                "required": ["name"]
            }),
        ),
        tool(
            "join_chatroom",
            "Join an existing chatroom by name.",
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "description": "Chatroom name" }
                },
                "required": ["id"]
            }),
        ),
        tool("leave_chatroom", "Leave the current chatroom.", no_args()),
        tool(
            "get_current_chatroom",
            "The chatroom the bot is in, as last reported by the server.",
            no_args(),
        ),
        tool(
            "get_chat_history",
            "Recent chat messages of the current chatroom.",
            json!({
                "type": "object",
                "properties": {
                    "limit": { "type": "integer", "minimum": 1, "maximum": 100 }
                }
            }),
        ),
        tool(
            "query_account",
            "Look up an account by member number.",
            member_number_args("account"),
        ),
        tool(
            "get_character_data",
            "Character data of a member in the current chatroom.",
            member_number_args("character"),
        ),
        tool(
            "get_room_member_detail",
            "Details of a member in the current chatroom.",
            member_number_args("member"),
        ),
    ]
}

fn is_known_tool(name: &str) -> bool {
    tool_definitions().iter().any(|t| t.name == name)
}

/// Handle one decoded JSON-RPC message. Returns None for notifications.
pub async fn handle_request(state: &McpState, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
    tracing::debug!(method = %request.method, "MCP request received");

    if request.jsonrpc != "2.0" {
        return Some(JsonRpcResponse::failure(
            request.id,
            INVALID_REQUEST,
            "jsonrpc must be \"2.0\"",
        ));
    }

    if request.id.is_none() {
        if request.method == "notifications/initialized" {
            tracing::info!("MCP initialized notification received");
        } else {
            tracing::debug!(method = %request.method, "Ignoring notification");
        }
        return None;
    }

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(&request),
        "ping" => JsonRpcResponse::success(request.id.clone(), json!({})),
        "tools/list" => JsonRpcResponse::success(
            request.id.clone(),
            json!({ "tools": tool_definitions() }),
        ),
        "tools/call" => handle_tools_call(state, &request).await,
        _ => JsonRpcResponse::failure(
            request.id.clone(),
            METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        ),
    };
    Some(response)
}

/// Handle one raw JSON-RPC value, mapping undecodable requests to -32600
pub async fn handle_value(state: &McpState, value: Value) -> Option<JsonRpcResponse> {
    let id = value.get("id").cloned();
    match serde_json::from_value::<JsonRpcRequest>(value) {
        Ok(request) => handle_request(state, request).await,
        Err(e) => Some(JsonRpcResponse::failure(
            id,
            INVALID_REQUEST,
            format!("Invalid request: {}", e),
        )),
    }
}

/// Handle one line of text, as read by the stdio transport
pub async fn handle_text(state: &McpState, text: &str) -> Option<JsonRpcResponse> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => handle_value(state, value).await,
        Err(e) => Some(JsonRpcResponse::failure(
            None,
            PARSE_ERROR,
            format!("Parse error: {}", e),
        )),
    }
}

/// Handle MCP JSON-RPC requests over HTTP
pub async fn mcp_handler(
    State(state): State<Arc<McpState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    match handle_value(&state, body).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

fn handle_initialize(request: &JsonRpcRequest) -> JsonRpcResponse {
    tracing::info!("MCP initialize request received");
    JsonRpcResponse::success(
        request.id.clone(),
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        }),
    )
}

async fn handle_tools_call(state: &McpState, request: &JsonRpcRequest) -> JsonRpcResponse {
    let Some(tool_name) = request.params.get("name").and_then(|v| v.as_str()) else {
        return JsonRpcResponse::failure(
            request.id.clone(),
            INVALID_PARAMS,
            "tools/call requires a tool name",
        );
    };
    if !is_known_tool(tool_name) {
        return JsonRpcResponse::failure(
            request.id.clone(),
            INVALID_PARAMS,
            format!("Unknown tool: {}", tool_name),
        );
    }

    let arguments = request
        .params
        .get("arguments")
        .cloned()
        .unwrap_or(Value::Null);

    tracing::info!(tool = %tool_name, "MCP tool call");
    let result = call_tool(state, tool_name, arguments).await;

    match &result {
        Ok(_) => metrics::record_tool_call(tool_name, "ok"),
        Err(e) => {
            tracing::info!(tool = %tool_name, error = %e, "MCP tool call failed");
            metrics::record_tool_call(tool_name, e.kind().as_str());
        }
    }
    JsonRpcResponse::success(request.id.clone(), tool_result(result))
}

/// Shape a tool outcome as an MCP tools/call result
pub fn tool_result(result: BotResult<Value>) -> Value {
    match result {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
            json!({
                "content": [{ "type": "text", "text": text }],
                "structuredContent": value
            })
        }
        Err(err) => {
            let kind = err.kind();
            let message = err.detail();
            json!({
                "content": [{ "type": "text", "text": format!("{}: {}", kind, message) }],
                "isError": true,
                "structuredContent": {
                    "error": { "kind": kind, "message": message }
                }
            })
        }
    }
}

/// Decode tool arguments; a missing argument object means no arguments
fn parse_args<T: DeserializeOwned>(args: Value) -> BotResult<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| BotError::invalid(format!("invalid arguments: {}", e)))
}

fn to_json<T: Serialize>(value: &T) -> BotResult<Value> {
    serde_json::to_value(value).map_err(|e| BotError::InternalError(e.to_string()))
}

/// Tools that run a command against the live session
fn is_session_command(name: &str) -> bool {
    !matches!(
        name,
        "start_bot" | "stop_bot" | "get_bot_status" | "get_recent_events"
    )
}

/// Run one tool against the session manager.
///
/// A session command that completes after its session was stopped or lost
/// still returns its result, with a `warning` field saying so.
pub async fn call_tool(state: &McpState, name: &str, args: Value) -> BotResult<Value> {
    let generation = state
        .controller
        .live_session()
        .ok()
        .map(|live| live.generation);

    let mut value = run_tool(state, name, args).await?;

    if let (true, Some(generation)) = (is_session_command(name), generation) {
        if !state.controller.is_current(generation) {
            if let Some(fields) = value.as_object_mut() {
                fields.insert(
                    "warning".to_string(),
                    json!("the bot session ended while this command was in flight"),
                );
            }
        }
    }
    Ok(value)
}

async fn run_tool(state: &McpState, name: &str, args: Value) -> BotResult<Value> {
    let controller = &state.controller;
    let dispatcher = &state.dispatcher;

    match name {
        "start_bot" => {
            let req: StartBotRequest = parse_args(args)?;
            let config = state.defaults.resolve(&req).await?;
            controller.start(config).await?;
            Ok(json!({ "message": "bot started", "status": to_json(&controller.status())? }))
        }
        "stop_bot" => {
            controller.stop().await?;
            Ok(json!({ "message": "bot stopped", "status": to_json(&controller.status())? }))
        }
        "get_bot_status" => to_json(&controller.status()),
        "send_chat_message" => {
            let cmd: SendChatMessage = parse_args(args)?;
            dispatcher.send_chat_message(&cmd).await?;
            Ok(json!({ "message": "sent" }))
        }
        "get_recent_events" => {
            let query: RecentEventsQuery = parse_args(args)?;
            let buffer = controller.buffer();
            let events = buffer.query(query.since, query.limit)?;
            Ok(json!({
                "count": events.len(),
                "latest_sequence": buffer.latest_sequence(),
                "events": to_json(&events)?,
            }))
        }
        "search_chatrooms" => {
            let query: RoomQuery = parse_args(args)?;
            let rooms = dispatcher.search_chatrooms(&query).await?;
            Ok(json!({ "rooms": to_json(&rooms)? }))
        }
        "create_chatroom" => {
            let params: RoomParams = parse_args(args)?;
            let room = dispatcher.create_chatroom(&params).await?;
            Ok(json!({ "chatroom": to_json(&room)? }))
        }
        "join_chatroom" => {
            let cmd: JoinChatroom = parse_args(args)?;
            let room = dispatcher.join_chatroom(&cmd).await?;
            Ok(json!({ "chatroom": to_json(&room)? }))
        }
        "leave_chatroom" => {
            let left = dispatcher.leave_chatroom().await?;
            Ok(json!({ "left": left }))
        }
        "get_current_chatroom" => {
            let room = dispatcher.get_current_chatroom()?;
            Ok(json!({ "chatroom": to_json(&room)? }))
        }
        "get_chat_history" => {
            let query: HistoryQuery = parse_args(args)?;
            let messages = dispatcher.get_chat_history(&query).await?;
            Ok(json!({ "messages": messages }))
        }
        "query_account" => {
            let lookup: MemberLookup = parse_args(args)?;
            Ok(json!({ "account": dispatcher.query_account(&lookup).await? }))
        }
        "get_character_data" => {
            let lookup: MemberLookup = parse_args(args)?;
            Ok(json!({ "character": dispatcher.get_character_data(&lookup).await? }))
        }
        "get_room_member_detail" => {
            let lookup: MemberLookup = parse_args(args)?;
            Ok(json!({ "member": dispatcher.get_room_member_detail(&lookup).await? }))
        }
        other => Err(BotError::InternalError(format!("no handler for tool {}", other))),
    }
}
