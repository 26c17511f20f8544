//! Response cache shared by every fetch call.
//!
//! Entries are JSON values keyed by request signature. Expiry is checked
//! lazily on read: an expired entry is removed the first time it is looked
//! up and is otherwise left in memory. There is no background sweep.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

/// Source of "now" for cache expiry and fetch timestamps.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Memoized response with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cached payload.
    pub value: Value,
    /// Entry is usable while `now < expires_at`.
    pub expires_at: OffsetDateTime,
}

/// Process-wide response cache.
///
/// Keys never contain the provider credential, so they can be logged.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ResponseCache {
    /// Create an empty cache driven by `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Clock used for expiry decisions.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Look up a live entry, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();

        match self.entries.get(key) {
            Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        // Shard guard is released above; a concurrent refresh may have replaced the entry.
        debug!(cache_key = %key, "Evicting expired cache entry");
        self.entries.remove_if(key, |_, entry| now >= entry.expires_at);

        None
    }

    /// Store a value for `ttl` from now.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn cache_at_epoch() -> (ResponseCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(datetime!(2024-03-01 12:00 UTC)));
        (ResponseCache::new(clock.clone()), clock)
    }

    #[test]
    fn returns_value_within_ttl() {
        let (cache, clock) = cache_at_epoch();
        cache.set("/sports?", json!(["nba"]), Duration::from_secs(60));

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("/sports?"), Some(json!(["nba"])));
    }

    #[test]
    fn entry_is_absent_at_exact_expiry_and_removed() {
        let (cache, clock) = cache_at_epoch();
        cache.set("/sports?", json!([]), Duration::from_secs(60));
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get("/sports?"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_entries_stay_until_read() {
        let (cache, clock) = cache_at_epoch();
        cache.set("a", json!(1), Duration::from_secs(1));
        cache.set("b", json!(2), Duration::from_secs(1));

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let (cache, _) = cache_at_epoch();
        cache.set("a", json!(1), Duration::from_secs(10));
        cache.clear();
        assert!(cache.is_empty());
    }
}
