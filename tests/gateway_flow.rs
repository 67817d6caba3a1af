//! End-to-end flows through the HTTP surface with a fake ERP collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use clap::Parser;
use emg::{AppConfig, AppState, CliArgs};
use erp_client::{ErpClient, ErpError, ErpResult, Kwargs};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Replays canned results per ERP method.
struct FakeErp;

#[async_trait]
impl ErpClient for FakeErp {
    async fn authenticate(&self) -> ErpResult<i64> {
        Ok(2)
    }

    async fn execute(
        &self,
        model: &str,
        method: &str,
        _args: Vec<Value>,
        _kwargs: Kwargs,
    ) -> ErpResult<Value> {
        match method {
            "search" => Ok(json!([1, 2, 3])),
            "read" | "search_read" => Ok(json!([
                { "id": 1, "name": "Azure Interior", "email": "azure@example.com" }
            ])),
            "create" => Ok(json!(55)),
            "write" | "unlink" => Ok(json!(true)),
            "fields_get" => Ok(json!({
                "name": { "string": "Name", "type": "char", "required": true }
            })),
            other => Err(ErpError::Validation(format!(
                "unexpected method '{other}' on {model}"
            ))),
        }
    }
}

fn test_router() -> Router {
    let args = CliArgs::parse_from([
        "erp-mcp-gateway",
        "--api-keys",
        "test_key_123",
        "--odoo-url",
        "http://localhost:8069",
        "--odoo-db",
        "test",
        "--odoo-username",
        "admin",
        "--odoo-password",
        "admin-password",
        "--secret-key",
        "integration-test-secret",
    ]);
    let config = AppConfig::from_args(&args);
    let state = AppState::new(&config, Arc::new(FakeErp)).unwrap();
    emg::router(state)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn static_key_search_scenario() {
    let router = test_router();
    let (status, body) = send(
        &router,
        post_json(
            "/call_tool",
            Some("test_key_123"),
            json!({
                "tool": "search",
                "arguments": {
                    "model": "res.partner",
                    "domain": [["customer_rank", ">", 0]],
                    "limit": 10
                }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let ids = body["record_ids"].as_array().unwrap();
    assert!(ids.len() <= 10);
    assert!(ids.iter().all(Value::is_i64));
}

#[tokio::test]
async fn unknown_bearer_is_unauthorized() {
    let router = test_router();
    let (status, body) = send(
        &router,
        post_json(
            "/call_tool",
            Some("not-a-real-credential"),
            json!({ "tool": "search", "arguments": { "model": "res.partner", "domain": [] } }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn missing_credential_is_unauthorized() {
    let router = test_router();
    let (status, body) = send(
        &router,
        post_json("/call_tool", None, json!({ "tool": "search", "arguments": {} })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn string_ids_fail_validation() {
    let router = test_router();
    let (status, body) = send(
        &router,
        post_json(
            "/call_tool",
            Some("test_key_123"),
            json!({
                "tool": "update",
                "arguments": {
                    "model": "res.partner",
                    "ids": ["1"],
                    "values": { "name": "Renamed" }
                }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn login_then_session_token_works() {
    let router = test_router();

    let (status, body) = send(
        &router,
        post_json(
            "/login",
            None,
            json!({ "username": "admin", "password": "admin-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(&router, get("/tools", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tools"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn login_with_bad_password_rejected() {
    let router = test_router();
    let (status, body) = send(
        &router,
        post_json(
            "/login",
            None,
            json!({ "username": "admin", "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn discovery_metadata_shape() {
    let router = test_router();
    let (status, body) = send(&router, get("/.well-known/oauth-authorization-server", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["issuer"], "http://0.0.0.0:5000");
    assert!(body["token_endpoint"].as_str().unwrap().ends_with("/oauth/token"));
    let methods = body["code_challenge_methods_supported"].as_array().unwrap();
    assert!(methods.contains(&json!("plain")));
    assert!(methods.contains(&json!("S256")));
}

/// Register, authorize, exchange, call a tool, then verify the code cannot
/// be redeemed twice.
#[tokio::test]
async fn oauth_round_trip() {
    let router = test_router();

    let (status, registration) = send(
        &router,
        post_json(
            "/oauth/register",
            None,
            json!({
                "client_name": "workflow-node",
                "redirect_uris": ["https://example.com/cb"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let client_id = registration["client_id"].as_str().unwrap().to_string();
    let client_secret = registration["client_secret"].as_str().unwrap().to_string();

    let authorize_uri = format!(
        "/oauth/authorize?response_type=code&client_id={client_id}&redirect_uri=https%3A%2F%2Fexample.com%2Fcb&state=xyz"
    );
    let response = router
        .clone()
        .oneshot(get(&authorize_uri, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("https://example.com/cb?"));
    assert!(location.contains("state=xyz"));
    let code = location
        .split(&['?', '&'][..])
        .find_map(|part| part.strip_prefix("code="))
        .unwrap()
        .to_string();

    // Exchange via form body with client credentials in the body.
    let form = format!(
        "grant_type=authorization_code&code={code}&redirect_uri=https%3A%2F%2Fexample.com%2Fcb&client_id={client_id}&client_secret={client_secret}"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/oauth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.clone()))
        .unwrap();
    let (status, tokens) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens["token_type"], "Bearer");
    let access_token = tokens["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        post_json(
            "/call_tool",
            Some(&access_token),
            json!({
                "tool": "search_read",
                "arguments": {
                    "model": "res.partner",
                    "domain": [["customer_rank", ">", 0]],
                    "fields": ["name", "email"],
                    "limit": 5
                }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 1);

    // Replaying the same authorization code fails.
    let request = Request::builder()
        .method("POST")
        .uri("/oauth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn read_scoped_token_cannot_delete() {
    let router = test_router();

    let (_, registration) = send(
        &router,
        post_json(
            "/oauth/register",
            None,
            json!({ "redirect_uris": ["https://example.com/cb"] }),
        ),
    )
    .await;
    let client_id = registration["client_id"].as_str().unwrap();
    let client_secret = registration["client_secret"].as_str().unwrap();

    let authorize_uri = format!(
        "/oauth/authorize?response_type=code&client_id={client_id}&redirect_uri=https%3A%2F%2Fexample.com%2Fcb&scope=read"
    );
    let response = router
        .clone()
        .oneshot(get(&authorize_uri, None))
        .await
        .unwrap();
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    let code = location
        .split(&['?', '&'][..])
        .find_map(|part| part.strip_prefix("code="))
        .unwrap();

    // Exchange via JSON body this time.
    let (status, tokens) = send(
        &router,
        post_json(
            "/oauth/token",
            None,
            json!({
                "grant_type": "authorization_code",
                "code": code,
                "redirect_uri": "https://example.com/cb",
                "client_id": client_id,
                "client_secret": client_secret
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tokens["scope"], "read");
    let access_token = tokens["access_token"].as_str().unwrap();

    let (status, body) = send(
        &router,
        post_json(
            "/call_tool",
            Some(access_token),
            json!({
                "tool": "delete",
                "arguments": { "model": "res.partner", "ids": [1] }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn mcp_endpoint_lists_and_calls_tools() {
    let router = test_router();

    let (status, body) = send(
        &router,
        post_json(
            "/mcp",
            Some("test_key_123"),
            json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 7);

    let (status, body) = send(
        &router,
        post_json(
            "/mcp",
            Some("test_key_123"),
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": {
                    "name": "create",
                    "arguments": {
                        "model": "res.partner",
                        "values": { "name": "New Partner" }
                    }
                }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["isError"], false);
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    let envelope: Value = serde_json::from_str(text).unwrap();
    assert_eq!(envelope["record_id"], 55);
}

#[tokio::test]
async fn mcp_initialize_and_unknown_method() {
    let router = test_router();

    let (_, body) = send(
        &router,
        post_json(
            "/mcp",
            Some("test_key_123"),
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
        ),
    )
    .await;
    assert_eq!(body["result"]["serverInfo"]["name"], "erp-mcp-gateway");

    let (_, body) = send(
        &router,
        post_json(
            "/mcp",
            Some("test_key_123"),
            json!({ "jsonrpc": "2.0", "id": 2, "method": "resources/list" }),
        ),
    )
    .await;
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn health_reports_erp_connectivity() {
    let router = test_router();
    let (status, body) = send(&router, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["erp_connected"], true);
    assert_eq!(body["erp_uid"], 2);
}

#[tokio::test]
async fn expired_refresh_token_yields_invalid_grant() {
    let router = test_router();

    let (_, registration) = send(
        &router,
        post_json(
            "/oauth/register",
            None,
            json!({ "redirect_uris": ["https://example.com/cb"] }),
        ),
    )
    .await;
    let client_id = registration["client_id"].as_str().unwrap();
    let client_secret = registration["client_secret"].as_str().unwrap();

    // A refresh token that was never issued behaves like an expired one:
    // consumed-or-unknown is indistinguishable by design.
    let (status, body) = send(
        &router,
        post_json(
            "/oauth/token",
            None,
            json!({
                "grant_type": "refresh_token",
                "refresh_token": "long-gone",
                "client_id": client_id,
                "client_secret": client_secret
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");
    assert!(body.get("access_token").is_none());
}
