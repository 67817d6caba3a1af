// core.rs
//
// Core types for the ERP client: the collaborator trait, error taxonomy,
// and shared aliases used by all backends.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Numeric record identifier used throughout the ERP's object model.
pub type RecordId = i64;

/// Keyword arguments for an `execute` call.
pub type Kwargs = serde_json::Map<String, Value>;

pub type ErpResult<T> = Result<T, ErpError>;

/// Faults raised by the ERP collaborator.
///
/// `Connection` and `Timeout` are transport-level and retryable; the rest are
/// definitive answers from the server and must not be retried.
#[derive(Debug, Error)]
pub enum ErpError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("validation fault: {0}")]
    Validation(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ErpError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErpError::Connection(_) | ErpError::Timeout(_))
    }
}

/// The narrow interface the gateway invokes the ERP through.
///
/// One generic entry point: execute a named method on a named model with
/// positional and keyword arguments. Higher layers translate tool names to
/// the ERP's native method names before calling in.
#[async_trait]
pub trait ErpClient: Send + Sync {
    /// Authenticate the configured service account. Returns the numeric
    /// user id the server assigned to the session.
    async fn authenticate(&self) -> ErpResult<i64>;

    /// Execute `method` on `model` with positional `args` and keyword
    /// `kwargs`, returning the raw result value.
    async fn execute(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> ErpResult<Value>;
}
