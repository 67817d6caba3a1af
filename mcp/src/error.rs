//! Gateway error types.
//!
//! Every failure a tool call can produce is normalized to a small taxonomy of
//! wire-visible kinds so callers can branch on kind without parsing prose.
//! Upstream fault detail is preserved in the message, never swallowed.

use erp_client::ErpError;
use serde::Serialize;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("ERP unreachable: {0}")]
    UpstreamUnavailable(String),

    #[error("ERP rejected the request: {0}")]
    UpstreamRejected(String),
}

impl GatewayError {
    /// Wire-visible error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::UnknownTool(_) | GatewayError::InvalidArguments(_) => "invalid_request",
            GatewayError::UpstreamUnavailable(_) => "upstream_unavailable",
            GatewayError::UpstreamRejected(_) => "upstream_rejected",
        }
    }
}

impl From<ErpError> for GatewayError {
    fn from(error: ErpError) -> Self {
        if error.is_retryable() {
            GatewayError::UpstreamUnavailable(error.to_string())
        } else {
            GatewayError::UpstreamRejected(error.to_string())
        }
    }
}

/// Error envelope returned on the tool-call wire.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: kind.into(),
            message: message.into(),
        }
    }
}

impl From<&GatewayError> for ErrorEnvelope {
    fn from(error: &GatewayError) -> Self {
        Self::new(error.kind(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            GatewayError::UnknownTool("nope".into()).kind(),
            "invalid_request"
        );
        assert_eq!(
            GatewayError::InvalidArguments("ids[0]".into()).kind(),
            "invalid_request"
        );
        assert_eq!(
            GatewayError::UpstreamUnavailable("refused".into()).kind(),
            "upstream_unavailable"
        );
        assert_eq!(
            GatewayError::UpstreamRejected("bad model".into()).kind(),
            "upstream_rejected"
        );
    }

    #[test]
    fn test_erp_error_normalization() {
        let timeout: GatewayError = ErpError::Timeout(Duration::from_secs(30)).into();
        assert_eq!(timeout.kind(), "upstream_unavailable");

        let fault: GatewayError = ErpError::Validation("no such field".into()).into();
        assert_eq!(fault.kind(), "upstream_rejected");
        // Original fault detail survives wrapping.
        assert!(fault.to_string().contains("no such field"));
    }

    #[test]
    fn test_error_envelope_shape() {
        let envelope = ErrorEnvelope::from(&GatewayError::UnknownTool("odoo_x".into()));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "invalid_request");
    }
}
