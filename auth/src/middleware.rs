//! Axum middleware placing the authorization gate in front of routes.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    gate::{AuthError, AuthGate},
    principal::Principal,
};

/// Shared state for [`bearer_auth_middleware`].
#[derive(Clone)]
pub struct AuthGateState {
    pub gate: Arc<AuthGate>,
}

impl AuthGateState {
    pub fn new(gate: Arc<AuthGate>) -> Self {
        Self { gate }
    }
}

/// Authorizes the request's bearer credential and stores the resulting
/// [`Principal`] in request extensions for handlers to extract.
pub async fn bearer_auth_middleware(
    State(state): State<AuthGateState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match state
        .gate
        .authorize_header(authorization, request_id.as_deref())
    {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(error) => auth_error_response(&error),
    }
}

/// Denial response in the wire envelope shape, with the status and
/// `WWW-Authenticate` challenge bearer clients expect.
pub fn auth_error_response(error: &AuthError) -> Response {
    let status = match error {
        AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::UNAUTHORIZED,
    };
    (
        status,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({
            "success": false,
            "error": error.kind(),
            "message": error.message(),
        })),
    )
        .into_response()
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| auth_error_response(&AuthError::MissingCredential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::Scope;

    #[test]
    fn test_forbidden_maps_to_403() {
        let response = auth_error_response(&AuthError::Forbidden(Scope::Write));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_unauthorized_maps_to_401_with_challenge() {
        let response = auth_error_response(&AuthError::Unauthorized { detail: None });
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response
                .headers()
                .get(header::WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok()),
            Some("Bearer")
        );
    }
}
