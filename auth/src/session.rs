//! Signed, time-bounded session tokens.
//!
//! Sessions are HS256 JWTs minted after the login operation verifies the
//! end user against the ERP. There is no per-token revocation; rotating the
//! process-wide secret invalidates every outstanding token.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionTokenError {
    /// Not a structurally valid token; some other credential family.
    #[error("not a session token")]
    Malformed,

    #[error("session token signature is invalid")]
    InvalidSignature,

    /// Expiry wins over signature validity; an expired token is rejected
    /// even when correctly signed.
    #[error("session token expired")]
    Expired,
}

/// Mints and verifies session tokens against the process-wide secret.
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionTokens {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mints a token for `subject` expiring `ttl` from now.
    pub fn mint(&self, subject: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Mints a token with explicit issued-at/expiry offsets from now, for
    /// exercising expiry paths.
    #[cfg(test)]
    pub(crate) fn mint_with_offsets(
        &self,
        subject: &str,
        iat_offset: i64,
        exp_offset: i64,
    ) -> String {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: subject.to_string(),
            iat: now + iat_offset,
            exp: now + exp_offset,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).unwrap()
    }

    /// Verifies signature and expiry, with distinguishable failures.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionTokenError> {
        // Three dot-separated segments or it is some other credential.
        if token.split('.').count() != 3 {
            return Err(SessionTokenError::Malformed);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(error) => match error.kind() {
                ErrorKind::ExpiredSignature => Err(SessionTokenError::Expired),
                ErrorKind::InvalidSignature => Err(SessionTokenError::InvalidSignature),
                _ => Err(SessionTokenError::Malformed),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> SessionTokens {
        SessionTokens::new("test-secret", Duration::from_secs(1800))
    }

    #[test]
    fn test_mint_and_verify() {
        let tokens = tokens();
        let token = tokens.mint("admin").unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.exp - claims.iat, 1800);
    }

    #[test]
    fn test_expired_rejected_despite_valid_signature() {
        let tokens = tokens();
        // Correctly signed, but an hour past its expiry.
        let token = tokens.mint_with_offsets("admin", -7200, -3600);
        assert_eq!(tokens.verify(&token), Err(SessionTokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = tokens().mint("admin").unwrap();
        let other = SessionTokens::new("different-secret", Duration::from_secs(1800));
        assert_eq!(
            other.verify(&token),
            Err(SessionTokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_non_jwt_is_malformed() {
        assert_eq!(
            tokens().verify("test_key_123"),
            Err(SessionTokenError::Malformed)
        );
        assert_eq!(
            tokens().verify("a.b"),
            Err(SessionTokenError::Malformed)
        );
    }

    #[test]
    fn test_secret_rotation_invalidates_outstanding_tokens() {
        let before = SessionTokens::new("old-secret", Duration::from_secs(1800));
        let token = before.mint("admin").unwrap();

        let after = SessionTokens::new("new-secret", Duration::from_secs(1800));
        assert_eq!(
            after.verify(&token),
            Err(SessionTokenError::InvalidSignature)
        );
    }
}
