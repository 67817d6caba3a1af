//! OAuth endpoint handlers.
//!
//! The engine owns all semantics; these handlers only translate transport:
//! query strings, the three accepted token-request encodings (HTTP Basic,
//! form body, JSON body), and redirect construction.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use emg_auth::oauth::{
    AuthorizeRequest, ClientCredentials, OAuthError, RegistrationRequest, TokenRequest,
};
use serde_json::json;

use crate::state::AppState;

pub async fn discovery(State(state): State<AppState>) -> Response {
    Json(state.oauth.discovery()).into_response()
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> Response {
    match state.oauth.register(request) {
        Ok(registration) => (StatusCode::CREATED, Json(registration)).into_response(),
        Err(error) => oauth_error_response(&error),
    }
}

pub async fn authorize(
    State(state): State<AppState>,
    Query(request): Query<AuthorizeRequest>,
) -> Response {
    match state.oauth.authorize(&request) {
        Ok(code) => {
            let mut params = vec![("code", code)];
            if let Some(csrf_state) = &request.state {
                params.push(("state", csrf_state.clone()));
            }
            let query = serde_urlencoded::to_string(params).unwrap_or_default();
            let separator = if request.redirect_uri.contains('?') {
                '&'
            } else {
                '?'
            };
            Redirect::to(&format!("{}{separator}{query}", request.redirect_uri)).into_response()
        }
        Err(error) => oauth_error_response(&error),
    }
}

pub async fn token(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = match parse_token_request(&headers, &body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let credentials = merge_credentials(&headers, &request);

    match state.oauth.exchange(&request, &credentials) {
        Ok(tokens) => Json(tokens).into_response(),
        Err(error) => oauth_error_response(&error),
    }
}

/// The token endpoint accepts the same parameters as JSON or as a form
/// body; the error for anything unparsable is a standard `invalid_request`.
fn parse_token_request(headers: &HeaderMap, body: &Bytes) -> Result<TokenRequest, Response> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    let parsed = if content_type.starts_with("application/json") {
        serde_json::from_slice::<TokenRequest>(body).map_err(|e| e.to_string())
    } else {
        serde_urlencoded::from_bytes::<TokenRequest>(body).map_err(|e| e.to_string())
    };

    parsed.map_err(|detail| {
        oauth_error_response(&OAuthError::InvalidRequest(format!(
            "malformed token request: {detail}"
        )))
    })
}

/// HTTP Basic credentials take precedence over body parameters.
fn merge_credentials(headers: &HeaderMap, request: &TokenRequest) -> ClientCredentials {
    if let Some((client_id, client_secret)) = basic_auth(headers) {
        return ClientCredentials {
            client_id: Some(client_id),
            client_secret: Some(client_secret),
        };
    }
    ClientCredentials {
        client_id: request.client_id.clone(),
        client_secret: request.client_secret.clone(),
    }
}

fn basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (client_id, client_secret) = decoded.split_once(':')?;
    Some((client_id.to_string(), client_secret.to_string()))
}

pub fn oauth_error_response(error: &OAuthError) -> Response {
    let status = match error {
        OAuthError::InvalidClient(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::BAD_REQUEST,
    };
    (
        status,
        Json(json!({
            "error": error.error_code(),
            "error_description": error.description(),
        })),
    )
        .into_response()
}
