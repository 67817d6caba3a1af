//! Authentication and authorization for the ERP MCP gateway.
//!
//! This crate provides:
//! - Static API key, session-token, and OAuth credential validation behind
//!   a single authorization gate
//! - A full OAuth 2.0 authorization-code flow with dynamic client
//!   registration, PKCE, refresh rotation, and discovery metadata
//! - Audit logging of every authorization decision
//! - Axum middleware for securing gateway routes

mod audit;
mod config;
mod gate;
mod middleware;
pub mod oauth;
mod principal;
mod session;
mod validator;

pub use audit::{AuditEvent, AuditLog, AuditOutcome};
pub use config::{ApiKeyEntry, AuthConfig};
pub use gate::{AuthError, AuthGate};
pub use middleware::{auth_error_response, bearer_auth_middleware, AuthGateState};
pub use principal::{CredentialKind, Principal, Scope, ScopeSet};
pub use session::{SessionClaims, SessionTokenError, SessionTokens};
pub use validator::{
    CredentialValidator, OAuthTokenValidator, RejectReason, SessionTokenValidator,
    StaticKeyValidator, Validation,
};

/// Request ID for correlation in audit logs.
///
/// The HTTP layer can add this to request extensions so audit records from
/// one request share an identifier.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);
