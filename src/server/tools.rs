//! Tool discovery and invocation handlers.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use emg_auth::{auth_error_response, Principal, Scope};
use emg_mcp::{ErrorEnvelope, GatewayError, ToolAccess, ToolCallRequest};
use serde_json::json;
use tracing::info;

use crate::state::AppState;

pub async fn list_tools(State(state): State<AppState>, principal: Principal) -> Response {
    info!(principal = %principal.id, kind = %principal.kind, "tools listed");
    Json(json!({ "tools": state.registry.descriptors() })).into_response()
}

pub async fn call_tool(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    Json(request): Json<ToolCallRequest>,
) -> Response {
    let request_id = request_id(&headers);

    if let Some(definition) = state.registry.get(&request.tool) {
        let scope = scope_for(definition.access);
        if let Err(error) = state
            .gate
            .require_scope(&principal, scope, request_id.as_deref())
        {
            return auth_error_response(&error);
        }
    }

    match state.dispatcher.call(&request.tool, &request.arguments).await {
        Ok(envelope) => Json(envelope).into_response(),
        Err(error) => gateway_error_response(&error),
    }
}

pub fn scope_for(access: ToolAccess) -> Scope {
    match access {
        ToolAccess::Read => Scope::Read,
        ToolAccess::Write => Scope::Write,
    }
}

pub fn gateway_error_response(error: &GatewayError) -> Response {
    let status = match error {
        GatewayError::UnknownTool(_) | GatewayError::InvalidArguments(_) => {
            StatusCode::BAD_REQUEST
        }
        GatewayError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::UpstreamRejected(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorEnvelope::from(error))).into_response()
}

pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}
