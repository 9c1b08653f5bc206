//! Cache backend boundary.
//!
//! Cached-mode nodes memoize their raw values in an external key-value
//! store, addressed by a composite `"{name}_{key}"` key. The store outlives
//! node-level resets: a cached node that is reset recomputes by consulting
//! the store first, not by re-running its loader.
//!
//! The core only requires `get`, `put`, and `clear`. Persistence format and
//! disk backends are out of scope; [`MemoryCache`] is the default in-process
//! implementation.

use dashmap::DashMap;

/// An opaque key-value store consumed by cached-mode nodes.
pub trait CacheStore<V>: Send + Sync {
    /// Look up a previously stored value.
    fn get(&self, key: &str) -> Option<V>;

    /// Store a value under the given key, replacing any previous entry.
    fn put(&self, key: &str, value: V);

    /// Drop every entry. Invoked by a registry-wide reset.
    fn clear(&self);
}

/// In-memory cache store backed by a concurrent map.
pub struct MemoryCache<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CacheStore<V> for MemoryCache<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: &str, value: V) {
        self.entries.insert(key.to_string(), value);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_cache_round_trips() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get("market_data_2025-05-10"), None);

        cache.put("market_data_2025-05-10", 100.0);
        assert_eq!(cache.get("market_data_2025-05-10"), Some(100.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_replaces_existing_entry() {
        let cache = MemoryCache::new();
        cache.put("fx", 0.9);
        cache.put("fx", 0.95);
        assert_eq!(cache.get("fx"), Some(0.95));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_drops_all_entries() {
        let cache = MemoryCache::new();
        cache.put("a", 1);
        cache.put("b", 2);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
    }
}
