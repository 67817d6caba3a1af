//! HTTP surface of the gateway.
//!
//! Routing, CORS, request-id propagation, and the handlers that are pure
//! glue around the auth gate, OAuth engine, and dispatcher.

mod mcp;
mod oauth;
mod tools;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use emg_auth::{bearer_auth_middleware, AuthGateState};
use serde::{Deserialize, Serialize};
use serde_json::json;
use subtle::ConstantTimeEq;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let gate_state = AuthGateState::new(state.gate.clone());

    let protected = Router::new()
        .route("/tools", get(tools::list_tools))
        .route("/call_tool", post(tools::call_tool))
        .route("/mcp", post(mcp::handle))
        .route_layer(middleware::from_fn_with_state(
            gate_state,
            bearer_auth_middleware,
        ));

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/login", post(login))
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth::discovery),
        )
        .route("/oauth/register", post(oauth::register))
        .route("/oauth/authorize", get(oauth::authorize))
        .route("/oauth/token", post(oauth::token))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

async fn service_info() -> Json<serde_json::Value> {
    Json(json!({
        "name": "erp-mcp-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "mcp": "/mcp (POST, MCP JSON-RPC)",
            "tools": "/tools",
            "call_tool": "/call_tool",
            "login": "/login",
            "oauth_discovery": "/.well-known/oauth-authorization-server",
            "oauth_register": "/oauth/register",
            "oauth_authorize": "/oauth/authorize",
            "oauth_token": "/oauth/token",
        },
        "authentication": "Bearer token: static API key, session token from /login, or OAuth access token",
    }))
}

async fn health(State(state): State<AppState>) -> Response {
    match state.erp.authenticate().await {
        Ok(uid) => Json(json!({
            "status": "healthy",
            "erp_connected": true,
            "erp_uid": uid,
        }))
        .into_response(),
        Err(error) => {
            warn!(error = %error, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "erp_connected": false,
                    "error": error.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    access_token: String,
    token_type: String,
}

/// Validates the end user against the configured ERP service account and
/// mints a session token.
async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Response {
    let account = &state.service_account;
    if !account.is_configured() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "upstream_unavailable",
                "message": "login is not configured; set ODOO_USERNAME and ODOO_PASSWORD",
            })),
        )
            .into_response();
    }

    let username_ok: bool = request
        .username
        .as_bytes()
        .ct_eq(account.username.as_bytes())
        .into();
    let password_ok: bool = request
        .password
        .as_bytes()
        .ct_eq(account.password.as_bytes())
        .into();
    if !(username_ok && password_ok) {
        warn!(username = %request.username, "login rejected");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "success": false,
                "error": "unauthorized",
                "message": "invalid username or password",
            })),
        )
            .into_response();
    }

    // The credentials must also still be good against the ERP itself.
    if let Err(error) = state.erp.authenticate().await {
        warn!(error = %error, "ERP rejected the service account during login");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "success": false,
                "error": "unauthorized",
                "message": "unable to verify credentials against the ERP",
            })),
        )
            .into_response();
    }

    match state.sessions.mint(&request.username) {
        Ok(token) => {
            info!(username = %request.username, "login succeeded");
            Json(LoginResponse {
                access_token: token,
                token_type: "bearer".to_string(),
            })
            .into_response()
        }
        Err(error) => {
            warn!(error = %error, "failed to mint session token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "error": "invalid_request",
                    "message": "failed to mint session token",
                })),
            )
                .into_response()
        }
    }
}
