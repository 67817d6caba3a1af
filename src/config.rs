//! Configuration for the gateway binary.
//!
//! Everything is supplied via CLI flags or environment variables; the parsed
//! arguments are normalized into typed configs for the subsystems.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use emg_auth::{ApiKeyEntry, AuthConfig};
use emg_auth::oauth::OAuthConfig;
use erp_client::OdooConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Console,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "erp-mcp-gateway",
    about = "MCP tool gateway for Odoo-compatible ERP servers",
    version
)]
pub struct CliArgs {
    /// Base URL of the ERP server.
    #[arg(long, env = "ODOO_URL", default_value = "")]
    pub odoo_url: String,

    /// ERP database name.
    #[arg(long, env = "ODOO_DB", default_value = "")]
    pub odoo_db: String,

    /// Service account login used for every ERP call.
    #[arg(long, env = "ODOO_USERNAME", default_value = "")]
    pub odoo_username: String,

    #[arg(long, env = "ODOO_PASSWORD", default_value = "", hide_env_values = true)]
    pub odoo_password: String,

    /// ERP request timeout in seconds.
    #[arg(long, env = "ODOO_TIMEOUT", default_value_t = 30)]
    pub odoo_timeout: u64,

    /// Maximum retries for retryable ERP transport faults.
    #[arg(long, env = "ODOO_MAX_RETRIES", default_value_t = 3)]
    pub odoo_max_retries: u32,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Secret signing session tokens. Rotate to revoke all sessions.
    #[arg(
        long,
        env = "SECRET_KEY",
        default_value = "dev-secret-key-change-in-production",
        hide_env_values = true
    )]
    pub secret_key: String,

    /// Session token lifetime in minutes.
    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES", default_value_t = 30)]
    pub access_token_expire_minutes: u64,

    /// Comma-separated list of static API keys.
    #[arg(long, env = "API_KEYS", default_value = "", hide_env_values = true)]
    pub api_keys: String,

    /// Issuer URL advertised in OAuth discovery metadata. Defaults to
    /// `http://{host}:{port}`.
    #[arg(long, env = "ISSUER_URL")]
    pub issuer_url: Option<String>,

    /// Default TTL in seconds for cached ERP responses.
    #[arg(long, env = "CACHE_TTL", default_value_t = 300)]
    pub cache_ttl: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "json")]
    pub log_format: LogFormat,
}

/// End-user credentials the login operation verifies against. These are the
/// same credentials the ERP service account uses.
#[derive(Debug, Clone)]
pub struct ServiceAccount {
    pub username: String,
    pub password: String,
}

impl ServiceAccount {
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Typed configuration for the whole gateway.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub erp: OdooConfig,
    pub auth: AuthConfig,
    pub oauth: OAuthConfig,
    pub service_account: ServiceAccount,
    pub host: String,
    pub port: u16,
    pub cache_ttl: Duration,
}

impl AppConfig {
    pub fn from_args(args: &CliArgs) -> Self {
        let issuer = args
            .issuer_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", args.host, args.port));

        Self {
            erp: OdooConfig {
                url: args.odoo_url.clone(),
                db: args.odoo_db.clone(),
                username: args.odoo_username.clone(),
                password: args.odoo_password.clone(),
                timeout: Duration::from_secs(args.odoo_timeout),
                max_retries: args.odoo_max_retries,
            },
            auth: AuthConfig::new(args.secret_key.clone())
                .with_api_keys(parse_api_keys(&args.api_keys))
                .with_session_ttl(Duration::from_secs(args.access_token_expire_minutes * 60)),
            oauth: OAuthConfig {
                issuer,
                ..OAuthConfig::default()
            },
            service_account: ServiceAccount {
                username: args.odoo_username.clone(),
                password: args.odoo_password.clone(),
            },
            host: args.host.clone(),
            port: args.port,
            cache_ttl: Duration::from_secs(args.cache_ttl),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn erp_is_configured(&self) -> bool {
        !self.erp.url.is_empty() && !self.erp.db.is_empty() && !self.erp.username.is_empty()
    }
}

fn parse_api_keys(raw: &str) -> Vec<ApiKeyEntry> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(ApiKeyEntry::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CliArgs {
        CliArgs::parse_from(["erp-mcp-gateway"])
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_args(&args());
        assert_eq!(config.port, 5000);
        assert_eq!(config.erp.timeout, Duration::from_secs(30));
        assert_eq!(config.auth.session_ttl, Duration::from_secs(1800));
        assert_eq!(config.oauth.issuer, "http://0.0.0.0:5000");
        assert!(!config.erp_is_configured());
    }

    #[test]
    fn test_parse_api_keys() {
        let keys = parse_api_keys("test_key_123, other_key ,,");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].key, "test_key_123");
        assert_eq!(keys[1].key, "other_key");
        assert!(parse_api_keys("").is_empty());
    }

    #[test]
    fn test_explicit_issuer_wins() {
        let mut args = args();
        args.issuer_url = Some("https://gateway.example.com".into());
        let config = AppConfig::from_args(&args);
        assert_eq!(config.oauth.issuer, "https://gateway.example.com");
    }
}
