//! Minimal MCP JSON-RPC endpoint.
//!
//! Serves `initialize`, `ping`, `tools/list`, and `tools/call` so MCP-native
//! clients can connect over streamable HTTP. Tool failures are reported as
//! MCP tool results with `isError` set, carrying the same error envelope as
//! the plain tool-call route.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use emg_auth::Principal;
use emg_mcp::ErrorEnvelope;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::tools::{request_id, scope_for};
use crate::state::AppState;

const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

pub async fn handle(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    debug!(method = %request.method, "MCP request");

    // Notifications carry no id and expect no body.
    let Some(id) = request.id else {
        return StatusCode::ACCEPTED.into_response();
    };

    match request.method.as_str() {
        "initialize" => rpc_result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "erp-mcp-gateway",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        "ping" => rpc_result(id, json!({})),
        "tools/list" => rpc_result(id, json!({ "tools": state.registry.descriptors() })),
        "tools/call" => tool_call(state, principal, &headers, id, &request.params).await,
        _ => rpc_error(id, -32601, "Method not found"),
    }
}

async fn tool_call(
    state: AppState,
    principal: Principal,
    headers: &HeaderMap,
    id: Value,
    params: &Value,
) -> Response {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return rpc_error(id, -32602, "tools/call requires a tool name");
    };
    let arguments: Map<String, Value> = params
        .get("arguments")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if let Some(definition) = state.registry.get(name) {
        let scope = scope_for(definition.access);
        if let Err(error) = state
            .gate
            .require_scope(&principal, scope, request_id(headers).as_deref())
        {
            let envelope = ErrorEnvelope::new(error.kind(), error.message());
            return tool_result(id, &serde_json::to_value(envelope).unwrap_or_default(), true);
        }
    }

    match state.dispatcher.call(name, &arguments).await {
        Ok(envelope) => tool_result(id, &envelope, false),
        Err(error) => {
            let envelope = ErrorEnvelope::from(&error);
            tool_result(id, &serde_json::to_value(envelope).unwrap_or_default(), true)
        }
    }
}

/// MCP tool results are text content carrying the JSON envelope.
fn tool_result(id: Value, envelope: &Value, is_error: bool) -> Response {
    let text = serde_json::to_string_pretty(envelope).unwrap_or_default();
    rpc_result(
        id,
        json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error,
        }),
    )
}

fn rpc_result(id: Value, result: Value) -> Response {
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result })).into_response()
}

fn rpc_error(id: Value, code: i64, message: &str) -> Response {
    Json(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    }))
    .into_response()
}
