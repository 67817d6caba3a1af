//! LRU response cache with per-entry TTL.

use std::{
    num::NonZeroUsize,
    time::{Duration, Instant},
};

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Bounded cache for read-mostly ERP responses.
///
/// Entries carry their own TTL so field metadata (stable for the lifetime of
/// a deployment) can outlive search results.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<LruCache<String, Entry>>,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_capacity(default_ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(default_ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl,
        }
    }

    /// Builds a cache key from a method and its identifying parts.
    pub fn make_key(prefix: &str, parts: &[&str]) -> String {
        let mut key = String::from(prefix);
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                tracing::debug!(key, "cache hit");
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.pop(key);
                tracing::debug!(key, "cache entry expired");
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().put(key, entry);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_get() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("k".into(), json!([1, 2, 3]), None);
        assert_eq!(cache.get("k"), Some(json!([1, 2, 3])));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("k".into(), json!(true), Some(Duration::ZERO));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_bound() {
        let cache = ResponseCache::with_capacity(Duration::from_secs(60), 2);
        cache.insert("a".into(), json!(1), None);
        cache.insert("b".into(), json!(2), None);
        cache.insert("c".into(), json!(3), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_make_key() {
        let key = ResponseCache::make_key("search", &["res.partner", "[]", "10"]);
        assert_eq!(key, "search:res.partner:[]:10");
    }
}
