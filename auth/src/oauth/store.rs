//! Shared, concurrency-safe token tables with per-entry expiry.
//!
//! The tables back every OAuth lifecycle operation, so mutations must be
//! atomic with respect to concurrent readers. Consume-once semantics map
//! onto an atomic remove: of any number of concurrent consumers of one key,
//! exactly one receives the entry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::types::{AccessToken, AuthorizationCode, RefreshToken};

/// An entry with its own expiry instant.
pub trait Expiring {
    fn expires_at(&self) -> DateTime<Utc>;

    fn is_expired(&self) -> bool {
        self.expires_at() <= Utc::now()
    }
}

impl Expiring for AuthorizationCode {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Expiring for AccessToken {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Expiring for RefreshToken {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// In-memory keyed store. State is process-lifetime only; nothing survives
/// a restart. The interface (get/insert/remove/consume) is what a durable
/// backend would have to provide to replace it.
#[derive(Debug)]
pub struct ExpiringStore<T: Clone + Expiring> {
    entries: DashMap<String, T>,
}

impl<T: Clone + Expiring> Default for ExpiringStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Expiring> ExpiringStore<T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), value);
    }

    /// Returns the entry whether or not it has expired; callers decide how
    /// an expired entry differs from an absent one.
    pub fn get(&self, key: &str) -> Option<T> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn remove(&self, key: &str) -> Option<T> {
        self.entries.remove(key).map(|(_, value)| value)
    }

    /// Atomically takes the entry out of the table. Exactly one of any
    /// number of concurrent consumers gets `Some`.
    pub fn consume(&self, key: &str) -> Option<T> {
        self.remove(key)
    }

    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, value| !value.is_expired());
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
