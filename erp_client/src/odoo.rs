//! JSON-RPC client for Odoo-compatible ERP servers.
//!
//! Speaks the `/jsonrpc` endpoint: `common.authenticate` for session setup
//! and `object.execute_kw` for everything else. Transport faults are retried
//! with exponential backoff; definitive server faults are surfaced as typed
//! errors immediately.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use backoff::ExponentialBackoffBuilder;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    cache::ResponseCache,
    core::{ErpClient, ErpError, ErpResult, Kwargs},
};

/// Search results are only cached when bounded by a limit this size or less.
const SEARCH_CACHE_MAX_LIMIT: u64 = 100;

/// Field metadata barely changes; cache it for an hour.
const FIELDS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Connection settings for an Odoo-compatible server.
#[derive(Debug, Clone)]
pub struct OdooConfig {
    /// Base URL of the server, e.g. `https://erp.example.com`.
    pub url: String,
    /// Database name.
    pub db: String,
    /// Service account login.
    pub username: String,
    /// Service account password or API key.
    pub password: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transport faults.
    pub max_retries: u32,
}

impl OdooConfig {
    fn endpoint(&self) -> String {
        format!("{}/jsonrpc", self.url.trim_end_matches('/'))
    }

    /// Total time window for one logical call including retries.
    fn retry_window(&self) -> Duration {
        self.timeout * self.max_retries.max(1)
    }
}

/// JSON-RPC implementation of [`ErpClient`].
pub struct OdooClient {
    config: OdooConfig,
    http: reqwest::Client,
    uid: Mutex<Option<i64>>,
    request_id: AtomicU64,
    cache: Option<ResponseCache>,
}

impl OdooClient {
    pub fn new(config: OdooConfig) -> ErpResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ErpError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            uid: Mutex::new(None),
            request_id: AtomicU64::new(1),
            cache: None,
        })
    }

    #[must_use]
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Raw JSON-RPC call without retry.
    async fn call_once(&self, service: &str, method: &str, args: Vec<Value>) -> ErpResult<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": { "service": service, "method": method, "args": args },
            "id": id,
        });

        let response = self
            .http
            .post(self.config.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;

        if let Some(fault) = body.get("error") {
            return Err(classify_fault(fault));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| ErpError::Protocol("response carried neither result nor error".into()))
    }

    fn transport_error(&self, error: reqwest::Error) -> ErpError {
        if error.is_timeout() {
            ErpError::Timeout(self.config.timeout)
        } else {
            ErpError::Connection(error.to_string())
        }
    }

    /// JSON-RPC call with exponential backoff on retryable faults.
    async fn call(&self, service: &str, method: &str, args: Vec<Value>) -> ErpResult<Value> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_interval(Duration::from_secs(8))
            .with_max_elapsed_time(Some(self.config.retry_window()))
            .build();

        backoff::future::retry(backoff, || async {
            match self.call_once(service, method, args.clone()).await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!(service, method, error = %e, "retrying ERP call");
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    async fn ensure_uid(&self) -> ErpResult<i64> {
        if let Some(uid) = *self.uid.lock() {
            return Ok(uid);
        }

        let result = self
            .call(
                "common",
                "authenticate",
                vec![
                    json!(self.config.db),
                    json!(self.config.username),
                    json!(self.config.password),
                    json!({}),
                ],
            )
            .await?;

        // Odoo answers `false` rather than an error on bad credentials.
        let uid = result.as_i64().ok_or_else(|| {
            ErpError::Auth(format!(
                "authentication rejected for '{}' on database '{}'",
                self.config.username, self.config.db
            ))
        })?;

        *self.uid.lock() = Some(uid);
        debug!(uid, "ERP session established");
        Ok(uid)
    }

    fn cache_policy(&self, method: &str, kwargs: &Kwargs) -> Option<Option<Duration>> {
        match method {
            "fields_get" => Some(Some(FIELDS_CACHE_TTL)),
            "search" => {
                let limit = kwargs.get("limit").and_then(Value::as_u64)?;
                (limit <= SEARCH_CACHE_MAX_LIMIT).then_some(None)
            }
            _ => None,
        }
    }
}

/// Maps a JSON-RPC fault object to the typed error taxonomy.
///
/// Odoo identifies the server-side exception class in `error.data.name`;
/// the outer `error.message` is a generic envelope label.
fn classify_fault(fault: &Value) -> ErpError {
    let name = fault
        .pointer("/data/name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let detail = fault
        .pointer("/data/message")
        .and_then(Value::as_str)
        .or_else(|| fault.get("message").and_then(Value::as_str))
        .unwrap_or("unknown fault")
        .to_string();

    if name.ends_with("AccessError") || name.ends_with("AccessDenied") {
        ErpError::Permission(detail)
    } else if name.ends_with("ValidationError") || name.ends_with("UserError") {
        ErpError::Validation(detail)
    } else if name.ends_with("SessionExpiredException") {
        ErpError::Auth(detail)
    } else {
        ErpError::Protocol(detail)
    }
}

#[async_trait::async_trait]
impl ErpClient for OdooClient {
    async fn authenticate(&self) -> ErpResult<i64> {
        self.ensure_uid().await
    }

    async fn execute(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> ErpResult<Value> {
        let cache_ttl = self.cache_policy(method, &kwargs);
        let cache_key = match (&self.cache, cache_ttl) {
            (Some(_), Some(_)) => {
                let args_repr = serde_json::to_string(&args).unwrap_or_default();
                let kwargs_repr = serde_json::to_string(&kwargs).unwrap_or_default();
                Some(ResponseCache::make_key(
                    method,
                    &[model, &args_repr, &kwargs_repr],
                ))
            }
            _ => None,
        };

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.get(key) {
                return Ok(hit);
            }
        }

        let uid = self.ensure_uid().await?;
        debug!(model, method, "executing ERP method");

        let result = self
            .call(
                "object",
                "execute_kw",
                vec![
                    json!(self.config.db),
                    json!(uid),
                    json!(self.config.password),
                    json!(model),
                    json!(method),
                    Value::Array(args),
                    Value::Object(kwargs),
                ],
            )
            .await?;

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache.insert(key, result.clone(), cache_ttl.flatten());
        }

        Ok(result)
    }
}
