//! The authorization gate: single chokepoint in front of every tool call.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    audit::{AuditEvent, AuditLog, AuditOutcome},
    config::ApiKeyEntry,
    oauth::OAuthEngine,
    principal::{CredentialKind, Principal, Scope},
    session::SessionTokens,
    validator::{
        CredentialValidator, OAuthTokenValidator, SessionTokenValidator, StaticKeyValidator,
        Validation,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    MissingCredential,

    #[error("no credential recognized")]
    Unauthorized { detail: Option<String> },

    #[error("insufficient scope: '{0}' required")]
    Forbidden(Scope),
}

impl AuthError {
    /// Wire-visible error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingCredential | AuthError::Unauthorized { .. } => "unauthorized",
            AuthError::Forbidden(_) => "forbidden",
        }
    }

    /// Human-readable message including the rejection detail, when any.
    pub fn message(&self) -> String {
        match self {
            AuthError::Unauthorized {
                detail: Some(detail),
            } => format!("{self} ({detail})"),
            _ => self.to_string(),
        }
    }
}

/// Runs the credential validators in a fixed, deterministic order
/// (static key, then session token, then OAuth access token) and records
/// every decision in the audit log.
pub struct AuthGate {
    validators: Vec<Box<dyn CredentialValidator>>,
    audit: Arc<AuditLog>,
}

impl AuthGate {
    pub fn new(validators: Vec<Box<dyn CredentialValidator>>, audit: Arc<AuditLog>) -> Self {
        Self { validators, audit }
    }

    /// The standard validator chain in its fixed trial order.
    pub fn standard(
        api_keys: Vec<ApiKeyEntry>,
        sessions: Arc<SessionTokens>,
        oauth: Arc<OAuthEngine>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self::new(
            vec![
                Box::new(StaticKeyValidator::new(api_keys)),
                Box::new(SessionTokenValidator::new(sessions)),
                Box::new(OAuthTokenValidator::new(oauth)),
            ],
            audit,
        )
    }

    pub fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Authorizes a raw `Authorization` header value.
    pub fn authorize_header(
        &self,
        header: Option<&str>,
        request_id: Option<&str>,
    ) -> Result<Principal, AuthError> {
        let Some(credential) = header.and_then(extract_bearer) else {
            self.audit.record(AuditEvent::new(
                request_id.map(String::from),
                None,
                None,
                AuditOutcome::denied("missing_credential"),
            ));
            warn!("request carried no bearer credential");
            return Err(AuthError::MissingCredential);
        };

        self.authorize(credential, request_id)
    }

    /// Tries each validator in order; the first acceptance wins. If every
    /// validator declines, the denial is an aggregate `unauthorized` carrying
    /// the first specific rejection reason seen, if any.
    pub fn authorize(
        &self,
        credential: &str,
        request_id: Option<&str>,
    ) -> Result<Principal, AuthError> {
        let mut rejection: Option<(CredentialKind, String)> = None;

        for validator in &self.validators {
            match validator.validate(credential) {
                Validation::Accepted(principal) => {
                    info!(
                        kind = %principal.kind,
                        principal = %principal.id,
                        "request authenticated"
                    );
                    self.audit.record(AuditEvent::new(
                        request_id.map(String::from),
                        Some(principal.kind),
                        Some(principal.id.clone()),
                        AuditOutcome::Granted,
                    ));
                    return Ok(principal);
                }
                Validation::Rejected(reason) => {
                    if rejection.is_none() {
                        rejection = Some((validator.kind(), reason.as_str().to_string()));
                    }
                }
                Validation::Declined => {}
            }
        }

        let (kind, detail) = match rejection {
            Some((kind, reason)) => (Some(kind), Some(reason)),
            None => (None, None),
        };
        self.audit.record(AuditEvent::new(
            request_id.map(String::from),
            kind,
            None,
            AuditOutcome::denied(detail.clone().unwrap_or_else(|| "unauthorized".into())),
        ));
        warn!(reason = detail.as_deref().unwrap_or("no validator matched"), "request denied");
        Err(AuthError::Unauthorized { detail })
    }

    /// Scope check after authentication; denial is `forbidden`, not
    /// `unauthorized`.
    pub fn require_scope(
        &self,
        principal: &Principal,
        scope: Scope,
        request_id: Option<&str>,
    ) -> Result<(), AuthError> {
        if principal.can(scope) {
            return Ok(());
        }
        self.audit.record(AuditEvent::new(
            request_id.map(String::from),
            Some(principal.kind),
            Some(principal.id.clone()),
            AuditOutcome::denied(format!("missing scope '{scope}'")),
        ));
        warn!(
            principal = %principal.id,
            scope = %scope,
            "scope check failed"
        );
        Err(AuthError::Forbidden(scope))
    }
}

/// Pulls the credential out of a `Bearer <credential>` header value.
fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, credential) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let credential = credential.trim();
    (!credential.is_empty()).then_some(credential)
}
