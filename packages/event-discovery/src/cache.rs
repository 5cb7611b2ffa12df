//! Keyed TTL cache with lazy eviction.
//!
//! Backs the discovery-result cache and other short-lived lookup state.
//! Uses `tokio::time::Instant` so paused-clock tests are deterministic.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

struct Entry<V> {
    expires_at: Instant,
    value: V,
}

/// Process-wide TTL cache. A stale or missing entry is always safe, only
/// less efficient.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a live value; expired entries are evicted on access.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key,
            Entry {
                expires_at: Instant::now() + self.ttl,
                value,
            },
        );
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .retain(|_, e| e.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn returns_live_entries() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("a".into(), 1);
        assert_eq!(cache.get(&"a".into()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_expired_entries_on_access() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("a".into(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(cache.get(&"a".into()), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert("old".into(), 1);
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.insert("new".into(), 2);
        tokio::time::advance(Duration::from_secs(30)).await;

        cache.purge_expired();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new".into()), Some(2));
    }
}
