//! OAuth 2.0 authorization engine.
//!
//! Owns the lifecycle of registered clients, authorization codes, and
//! access/refresh tokens. All state is process-wide and in-memory; a
//! restart clears every table. Consent is auto-granted with no interactive
//! approval step, which limits this server to single-tenant or otherwise
//! trusted deployments.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use url::Url;

use super::store::{Expiring, ExpiringStore};
use super::types::{
    AccessToken, AuthorizationCode, AuthorizeRequest, ClientCredentials, ClientRegistration,
    DiscoveryMetadata, OAuthError, PkceMethod, RefreshToken, RegistrationRequest,
    TokenEndpointAuthMethod, TokenRequest, TokenResponse,
};
use crate::principal::ScopeSet;

const DEFAULT_GRANT_TYPES: [&str; 2] = ["authorization_code", "refresh_token"];

/// Timing and identity settings for the engine.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Issuer URL advertised in discovery metadata and used to derive the
    /// endpoint URLs.
    pub issuer: String,
    pub code_ttl: Duration,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:5000".to_string(),
            code_ttl: Duration::from_secs(600),
            access_token_ttl: Duration::from_secs(24 * 3600),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

/// Result of an access-token lookup, distinguishing "never issued" from
/// "issued but past expiry".
#[derive(Debug, Clone)]
pub enum AccessLookup {
    Valid(AccessToken),
    Expired,
    Unknown,
}

pub struct OAuthEngine {
    config: OAuthConfig,
    clients: DashMap<String, ClientRegistration>,
    codes: ExpiringStore<AuthorizationCode>,
    access_tokens: ExpiringStore<AccessToken>,
    refresh_tokens: ExpiringStore<RefreshToken>,
}

impl OAuthEngine {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
            codes: ExpiringStore::new(),
            access_tokens: ExpiringStore::new(),
            refresh_tokens: ExpiringStore::new(),
        }
    }

    /// Registers a new client. Not idempotent: repeated calls create
    /// distinct clients, per usual dynamic-registration semantics.
    pub fn register(&self, request: RegistrationRequest) -> Result<ClientRegistration, OAuthError> {
        if request.redirect_uris.is_empty() {
            return Err(OAuthError::InvalidRequest(
                "redirect_uris must not be empty".into(),
            ));
        }
        for uri in &request.redirect_uris {
            Url::parse(uri).map_err(|_| {
                OAuthError::InvalidRequest(format!("redirect_uri '{uri}' is not a valid URL"))
            })?;
        }

        let auth_method = request.token_endpoint_auth_method.unwrap_or_default();
        // Public clients never get a secret; confidential clients always do.
        let client_secret = (!auth_method.is_public()).then(|| random_token(32));

        let registration = ClientRegistration {
            client_id: random_token(16),
            client_name: request.client_name,
            redirect_uris: request.redirect_uris,
            grant_types: request
                .grant_types
                .unwrap_or_else(|| DEFAULT_GRANT_TYPES.iter().map(|s| s.to_string()).collect()),
            token_endpoint_auth_method: auth_method,
            client_secret,
            issued_at: Utc::now(),
        };

        info!(
            client_id = %registration.client_id,
            auth_method = auth_method.as_str(),
            "registered OAuth client"
        );
        self.clients
            .insert(registration.client_id.clone(), registration.clone());
        Ok(registration)
    }

    pub fn client(&self, client_id: &str) -> Option<ClientRegistration> {
        self.clients.get(client_id).map(|entry| entry.clone())
    }

    /// Issues a single-use authorization code. Consent is auto-granted.
    pub fn authorize(&self, request: &AuthorizeRequest) -> Result<String, OAuthError> {
        if request.response_type != "code" {
            return Err(OAuthError::InvalidRequest(format!(
                "unsupported response_type '{}'",
                request.response_type
            )));
        }

        let registration = self
            .client(&request.client_id)
            .ok_or_else(|| OAuthError::InvalidClient("unknown client_id".into()))?;

        // Exact-match policy against the registered list, for every client
        // type including public ones.
        if !registration
            .redirect_uris
            .iter()
            .any(|uri| uri == &request.redirect_uri)
        {
            return Err(OAuthError::InvalidRequest(
                "redirect_uri is not registered for this client".into(),
            ));
        }

        let code_challenge_method = match (&request.code_challenge, &request.code_challenge_method)
        {
            (None, _) => None,
            (Some(_), None) => Some(PkceMethod::Plain),
            (Some(_), Some(method)) => Some(PkceMethod::parse(method).ok_or_else(|| {
                OAuthError::InvalidRequest(format!(
                    "unsupported code_challenge_method '{method}'"
                ))
            })?),
        };

        let scopes = match &request.scope {
            Some(scope) => ScopeSet::parse(scope),
            None => ScopeSet::full(),
        };

        let code = AuthorizationCode {
            code: random_token(32),
            client_id: registration.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
            scopes,
            expires_at: expires_in(self.config.code_ttl),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method,
        };

        info!(
            client_id = %code.client_id,
            code_prefix = %prefix(&code.code),
            "issued authorization code"
        );
        let issued = code.code.clone();
        self.codes.insert(issued.clone(), code);
        Ok(issued)
    }

    /// Token endpoint: authorization_code and refresh_token grants.
    pub fn exchange(
        &self,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OAuthError> {
        match request.grant_type.as_str() {
            "authorization_code" => self.exchange_code(request, credentials),
            "refresh_token" => self.refresh(request, credentials),
            other => Err(OAuthError::UnsupportedGrantType(other.to_string())),
        }
    }

    fn exchange_code(
        &self,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OAuthError> {
        let client_id = credentials
            .client_id
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidClient("client_id is required".into()))?;
        let code_value = request
            .code
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidRequest("code is required".into()))?;

        // Atomic take: a concurrent redemption race has exactly one winner,
        // every loser lands here with invalid_grant.
        let code = self.codes.consume(code_value).ok_or_else(|| {
            warn!(code_prefix = %prefix(code_value), "authorization code unknown or already used");
            OAuthError::InvalidGrant("authorization code is unknown or already used".into())
        })?;

        if code.is_expired() {
            return Err(OAuthError::InvalidGrant("authorization code expired".into()));
        }
        if code.client_id != client_id {
            return Err(OAuthError::InvalidGrant(
                "authorization code was issued to a different client".into(),
            ));
        }

        self.authenticate_client(client_id, credentials)?;

        match request.redirect_uri.as_deref() {
            Some(uri) if uri == code.redirect_uri => {}
            _ => {
                return Err(OAuthError::InvalidGrant(
                    "redirect_uri does not match the authorization request".into(),
                ))
            }
        }

        if let Some(challenge) = &code.code_challenge {
            let verifier = request.code_verifier.as_deref().ok_or_else(|| {
                OAuthError::InvalidRequest("code_verifier is required".into())
            })?;
            let method = code.code_challenge_method.unwrap_or(PkceMethod::Plain);
            if !verify_pkce(method, challenge, verifier) {
                return Err(OAuthError::InvalidGrant("PKCE verification failed".into()));
            }
        }

        Ok(self.mint_pair(&code.client_id, code.scopes.clone(), code.scopes))
    }

    fn refresh(
        &self,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OAuthError> {
        let client_id = credentials
            .client_id
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidClient("client_id is required".into()))?;
        let token_value = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidRequest("refresh_token is required".into()))?;

        // Rotation: the presented refresh token is consumed whatever
        // happens next, so a failed refresh cannot be retried with the
        // same token.
        let token = self.refresh_tokens.consume(token_value).ok_or_else(|| {
            OAuthError::InvalidGrant("refresh token is unknown or already rotated".into())
        })?;

        if token.is_expired() {
            return Err(OAuthError::InvalidGrant("refresh token expired".into()));
        }
        if token.client_id != client_id {
            return Err(OAuthError::InvalidGrant(
                "refresh token belongs to a different client".into(),
            ));
        }

        self.authenticate_client(client_id, credentials)?;

        // A refresh may narrow the granted scope but never widen it.
        let access_scopes = match &request.scope {
            Some(requested) => {
                let requested = ScopeSet::parse(requested);
                if !requested.is_subset(&token.scopes) {
                    return Err(OAuthError::InvalidScope(
                        "requested scope exceeds the original grant".into(),
                    ));
                }
                requested
            }
            None => token.scopes.clone(),
        };

        // Revoke the access token minted alongside the rotated refresh token.
        self.access_tokens.remove(&token.access_token);

        Ok(self.mint_pair(&token.client_id, access_scopes, token.scopes))
    }

    fn mint_pair(
        &self,
        client_id: &str,
        access_scopes: ScopeSet,
        grant_scopes: ScopeSet,
    ) -> TokenResponse {
        let access = AccessToken {
            token: random_token(48),
            client_id: client_id.to_string(),
            scopes: access_scopes.clone(),
            expires_at: expires_in(self.config.access_token_ttl),
        };
        let refresh = RefreshToken {
            token: random_token(48),
            client_id: client_id.to_string(),
            scopes: grant_scopes,
            access_token: access.token.clone(),
            expires_at: expires_in(self.config.refresh_token_ttl),
        };

        info!(
            client_id,
            token_prefix = %prefix(&access.token),
            scope = %access_scopes,
            "minted access token"
        );

        let response = TokenResponse::new(
            access.token.clone(),
            self.config.access_token_ttl.as_secs() as i64,
        )
        .with_refresh_token(refresh.token.clone())
        .with_scope(access_scopes.to_string());

        self.access_tokens.insert(access.token.clone(), access);
        self.refresh_tokens.insert(refresh.token.clone(), refresh);
        response
    }

    fn authenticate_client(
        &self,
        client_id: &str,
        credentials: &ClientCredentials,
    ) -> Result<(), OAuthError> {
        let registration = self
            .client(client_id)
            .ok_or_else(|| OAuthError::InvalidClient("unknown client_id".into()))?;

        if registration.is_public() {
            return Ok(());
        }

        let presented = credentials
            .client_secret
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidClient("client_secret is required".into()))?;
        let expected = registration.client_secret.as_deref().unwrap_or_default();

        if !constant_time_eq(presented, expected) {
            return Err(OAuthError::InvalidClient("client authentication failed".into()));
        }
        Ok(())
    }

    /// Looks up a bearer string in the access-token table. Expired entries
    /// are dropped on sight.
    pub fn validate_access(&self, token: &str) -> AccessLookup {
        match self.access_tokens.get(token) {
            Some(access) if access.is_expired() => {
                self.access_tokens.remove(token);
                AccessLookup::Expired
            }
            Some(access) => AccessLookup::Valid(access),
            None => AccessLookup::Unknown,
        }
    }

    /// Discovery metadata: a pure function of configuration.
    pub fn discovery(&self) -> DiscoveryMetadata {
        let issuer = self.config.issuer.trim_end_matches('/').to_string();
        DiscoveryMetadata {
            authorization_endpoint: format!("{issuer}/oauth/authorize"),
            token_endpoint: format!("{issuer}/oauth/token"),
            registration_endpoint: format!("{issuer}/oauth/register"),
            issuer,
            response_types_supported: vec!["code".into()],
            grant_types_supported: DEFAULT_GRANT_TYPES.iter().map(|s| s.to_string()).collect(),
            code_challenge_methods_supported: vec!["plain".into(), "S256".into()],
            token_endpoint_auth_methods_supported: vec![
                TokenEndpointAuthMethod::None.as_str().into(),
                TokenEndpointAuthMethod::ClientSecretBasic.as_str().into(),
                TokenEndpointAuthMethod::ClientSecretPost.as_str().into(),
            ],
            scopes_supported: vec!["read".into(), "write".into()],
        }
    }

    /// Drops expired codes and tokens from every table.
    pub fn purge_expired(&self) {
        let codes = self.codes.purge_expired();
        let access = self.access_tokens.purge_expired();
        let refresh = self.refresh_tokens.purge_expired();
        if codes + access + refresh > 0 {
            info!(codes, access, refresh, "purged expired OAuth state");
        }
    }
}

fn expires_in(ttl: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64)
}

/// URL-safe random token of `bytes` entropy bytes.
fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// First characters of a secret for log correlation.
fn prefix(token: &str) -> String {
    token.chars().take(10).collect::<String>() + "…"
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn verify_pkce(method: PkceMethod, challenge: &str, verifier: &str) -> bool {
    match method {
        PkceMethod::Plain => constant_time_eq(challenge, verifier),
        PkceMethod::S256 => {
            let digest = Sha256::digest(verifier.as_bytes());
            let derived = URL_SAFE_NO_PAD.encode(digest);
            constant_time_eq(challenge, &derived)
        }
    }
}
