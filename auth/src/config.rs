//! Configuration for the authentication subsystem.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A configured static API key.
///
/// The optional name appears in audit logs in place of the key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ApiKeyEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Loggable identifier: the configured name, or a short key prefix.
    pub fn display_id(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => {
                let prefix: String = self.key.chars().take(8).collect();
                format!("key:{prefix}…")
            }
        }
    }
}

/// Settings for static keys and session tokens.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_keys: Vec<ApiKeyEntry>,
    /// Process-wide secret signing session tokens. Rotating it invalidates
    /// every outstanding session token.
    pub session_secret: String,
    pub session_ttl: Duration,
}

impl AuthConfig {
    pub fn new(session_secret: impl Into<String>) -> Self {
        Self {
            api_keys: Vec::new(),
            session_secret: session_secret.into(),
            session_ttl: Duration::from_secs(30 * 60),
        }
    }

    #[must_use]
    pub fn with_api_keys(mut self, keys: Vec<ApiKeyEntry>) -> Self {
        self.api_keys = keys;
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_id_prefers_name() {
        let named = ApiKeyEntry::new("sk-abcdef1234567890").with_name("n8n-prod");
        assert_eq!(named.display_id(), "n8n-prod");
    }

    #[test]
    fn test_display_id_never_leaks_full_key() {
        let entry = ApiKeyEntry::new("sk-abcdef1234567890");
        let shown = entry.display_id();
        assert!(!shown.contains("1234567890"));
        assert!(shown.starts_with("key:sk-abcde"));
    }

    #[test]
    fn test_default_session_ttl() {
        let config = AuthConfig::new("secret");
        assert_eq!(config.session_ttl, Duration::from_secs(1800));
    }
}
