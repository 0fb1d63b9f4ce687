//! Read-through cache storage with moka
//!
//! Backs the core `CacheStore` port with an in-memory `moka::sync::Cache`.
//! Each entry carries its own TTL; capacity is bounded and eviction is
//! handled by moka.

use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;
use serde_json::Value;
use stockade_core::CacheStore;
use stockade_domain::CacheConfig;
use tracing::trace;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    ttl: Duration,
}

struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-memory JSON cache with per-entry TTL.
pub struct MokaCacheStore {
    entries: Cache<String, Entry>,
    config: CacheConfig,
}

impl MokaCacheStore {
    pub fn new(config: CacheConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryTtl)
            .build();
        Self { entries, config }
    }

    /// Default TTL for callers that do not choose their own.
    pub fn default_ttl(&self) -> Duration {
        self.config.ttl()
    }

    /// Log configuration at startup
    pub fn log_config(&self) {
        tracing::info!(
            ttl_seconds = self.config.ttl_secs,
            max_capacity = self.config.max_capacity,
            "cache configuration loaded"
        );
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

impl Default for MokaCacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CacheStore for MokaCacheStore {
    fn get(&self, key: &str) -> Option<Value> {
        let hit = self.entries.get(key).map(|entry| entry.value);
        trace!(key, hit = hit.is_some(), "cache lookup");
        hit
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        self.entries.insert(key.to_string(), Entry { value, ttl });
    }

    fn delete(&self, key: &str) {
        self.entries.invalidate(key);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn set_get_delete() {
        let cache = MokaCacheStore::default();
        cache.set("product:1", json!({"id": 1}), Duration::from_secs(60));
        assert_eq!(cache.get("product:1"), Some(json!({"id": 1})));

        cache.delete("product:1");
        assert_eq!(cache.get("product:1"), None);
    }

    #[test]
    fn entries_expire_after_their_ttl() {
        let cache = MokaCacheStore::default();
        cache.set("short", json!(1), Duration::from_millis(50));
        cache.set("long", json!(2), Duration::from_secs(60));

        std::thread::sleep(Duration::from_millis(120));

        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long"), Some(json!(2)));
    }

    #[test]
    fn zero_ttl_is_not_stored() {
        let cache = MokaCacheStore::default();
        cache.set("k", json!(true), Duration::ZERO);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn capacity_from_config() {
        let cache = MokaCacheStore::new(CacheConfig { ttl_secs: 5, max_capacity: 10 });
        assert_eq!(cache.default_ttl(), Duration::from_secs(5));
        cache.set("a", json!(1), cache.default_ttl());
        assert_eq!(cache.entry_count(), 1);
        cache.clear();
        assert_eq!(cache.get("a"), None);
    }
}
