//! Audit logging for authorization decisions.
//!
//! Every pass through the gate leaves a record: which credential family was
//! used and whether access was granted. Raw secrets never enter the log.

use std::{collections::VecDeque, sync::RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::principal::CredentialKind;

const DEFAULT_MAX_ENTRIES: usize = 10000;

/// Outcome of an authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Granted,
    Denied { reason: String },
}

impl AuditOutcome {
    pub fn denied(reason: impl Into<String>) -> Self {
        AuditOutcome::Denied {
            reason: reason.into(),
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, AuditOutcome::Granted)
    }
}

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Correlation id of the request, when the HTTP layer supplied one.
    pub request_id: Option<String>,
    /// Credential family that produced the decision, if one got that far.
    pub kind: Option<CredentialKind>,
    /// Loggable principal identifier (never the credential itself).
    pub principal: Option<String>,
    pub outcome: AuditOutcome,
}

impl AuditEvent {
    pub fn new(
        request_id: Option<String>,
        kind: Option<CredentialKind>,
        principal: Option<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            request_id,
            kind,
            principal,
            outcome,
        }
    }
}

/// Thread-safe bounded audit log.
#[derive(Debug)]
pub struct AuditLog {
    entries: RwLock<VecDeque<AuditEvent>>,
    max_entries: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(max_entries)),
            max_entries,
        }
    }

    pub fn record(&self, event: AuditEvent) {
        let mut entries = self.entries.write().unwrap();
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    pub fn recent(&self, limit: usize) -> Vec<AuditEvent> {
        let entries = self.entries.read().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_recent() {
        let log = AuditLog::new();
        log.record(AuditEvent::new(
            Some("req-1".into()),
            Some(CredentialKind::StaticKey),
            Some("n8n-prod".into()),
            AuditOutcome::Granted,
        ));

        assert_eq!(log.len(), 1);
        let recent = log.recent(10);
        assert_eq!(recent[0].principal.as_deref(), Some("n8n-prod"));
        assert!(recent[0].outcome.is_granted());
    }

    #[test]
    fn test_bounded_capacity() {
        let log = AuditLog::with_capacity(3);
        for i in 0..10 {
            log.record(AuditEvent::new(
                Some(format!("req-{i}")),
                None,
                None,
                AuditOutcome::denied("unauthorized"),
            ));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.recent(10)[0].request_id.as_deref(), Some("req-9"));
    }
}
