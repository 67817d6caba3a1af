//! Credential validators.
//!
//! A bearer string is indistinguishable by format alone, so the gate runs a
//! fixed, ordered set of validators. Each one either accepts (producing a
//! principal), rejects with a specific reason (it recognized its own
//! credential family but the credential is bad), or declines so the next
//! validator gets a try.

use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::{
    config::ApiKeyEntry,
    oauth::{AccessLookup, OAuthEngine},
    principal::{CredentialKind, Principal, ScopeSet},
    session::{SessionTokenError, SessionTokens},
};

/// Why a validator that recognized a credential turned it away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    InvalidSignature,
    Expired,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InvalidSignature => "invalid_signature",
            RejectReason::Expired => "expired",
        }
    }
}

/// Outcome of one validator's attempt.
#[derive(Debug, Clone)]
pub enum Validation {
    Accepted(Principal),
    Rejected(RejectReason),
    /// Not this validator's credential family; try the next one.
    Declined,
}

pub trait CredentialValidator: Send + Sync {
    fn kind(&self) -> CredentialKind;
    fn validate(&self, credential: &str) -> Validation;
}

/// Exact match against the configured allow-list. Grants full scope; static
/// keys never expire.
pub struct StaticKeyValidator {
    keys: Vec<ApiKeyEntry>,
}

impl StaticKeyValidator {
    pub fn new(keys: Vec<ApiKeyEntry>) -> Self {
        Self { keys }
    }
}

impl CredentialValidator for StaticKeyValidator {
    fn kind(&self) -> CredentialKind {
        CredentialKind::StaticKey
    }

    fn validate(&self, credential: &str) -> Validation {
        // Compare against every key without early exit so timing reveals
        // nothing about how close a guess came.
        let mut matched: Option<&ApiKeyEntry> = None;
        for entry in &self.keys {
            let equal: bool = entry
                .key
                .as_bytes()
                .ct_eq(credential.as_bytes())
                .into();
            if equal {
                matched = Some(entry);
            }
        }

        match matched {
            Some(entry) => Validation::Accepted(Principal::new(
                entry.display_id(),
                CredentialKind::StaticKey,
                ScopeSet::full(),
            )),
            None => Validation::Declined,
        }
    }
}

/// Verifies signed session tokens: signature and expiry, with
/// distinguishable rejection reasons.
pub struct SessionTokenValidator {
    tokens: Arc<SessionTokens>,
}

impl SessionTokenValidator {
    pub fn new(tokens: Arc<SessionTokens>) -> Self {
        Self { tokens }
    }
}

impl CredentialValidator for SessionTokenValidator {
    fn kind(&self) -> CredentialKind {
        CredentialKind::Session
    }

    fn validate(&self, credential: &str) -> Validation {
        match self.tokens.verify(credential) {
            Ok(claims) => Validation::Accepted(Principal::new(
                claims.sub,
                CredentialKind::Session,
                ScopeSet::full(),
            )),
            Err(SessionTokenError::Expired) => Validation::Rejected(RejectReason::Expired),
            Err(SessionTokenError::InvalidSignature) => {
                Validation::Rejected(RejectReason::InvalidSignature)
            }
            Err(SessionTokenError::Malformed) => Validation::Declined,
        }
    }
}

/// Looks the bearer string up in the OAuth engine's access-token table.
/// Scope is whatever the token was granted.
pub struct OAuthTokenValidator {
    engine: Arc<OAuthEngine>,
}

impl OAuthTokenValidator {
    pub fn new(engine: Arc<OAuthEngine>) -> Self {
        Self { engine }
    }
}

impl CredentialValidator for OAuthTokenValidator {
    fn kind(&self) -> CredentialKind {
        CredentialKind::OAuth
    }

    fn validate(&self, credential: &str) -> Validation {
        match self.engine.validate_access(credential) {
            AccessLookup::Valid(access) => Validation::Accepted(Principal::new(
                access.client_id,
                CredentialKind::OAuth,
                access.scopes,
            )),
            AccessLookup::Expired => Validation::Rejected(RejectReason::Expired),
            AccessLookup::Unknown => Validation::Declined,
        }
    }
}
