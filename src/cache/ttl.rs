//! Generic expiring key/value store.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use super::clock::{add_duration, Clock, SystemClock};

struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Key/value store whose entries disappear once their TTL has elapsed.
///
/// Eviction is lazy: an expired entry is removed by the first `get` that
/// observes it. One coarse `RwLock` guards the whole map, so lookups run in
/// parallel and any mutation is exclusive.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Store `value` until `now + ttl`, replacing any previous entry.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let expires_at = add_duration(self.clock.now(), ttl);
        self.entries
            .write()
            .insert(key, CacheEntry { value, expires_at });
    }

    /// Live value for `key`; an expired entry is evicted and reported absent.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if now < entry.expires_at => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a concurrent `set` may have refreshed it.
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.write().remove(key);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    fn cache_with_clock() -> (TtlCache<String, u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = TtlCache::with_clock(clock.clone());
        (cache, clock)
    }

    #[test]
    fn get_returns_value_before_expiry() {
        let (cache, _clock) = cache_with_clock();
        cache.set("a".to_string(), 1, Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some(1));
    }

    #[test]
    fn expired_entry_is_hidden_and_evicted_without_delete() {
        let (cache, clock) = cache_with_clock();
        cache.set("a".to_string(), 1, Duration::from_secs(60));

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("a"), Some(1));

        // now == expires_at counts as expired
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn set_overwrites_value_and_expiry() {
        let (cache, clock) = cache_with_clock();
        cache.set("a".to_string(), 1, Duration::from_secs(10));
        clock.advance(Duration::from_secs(5));
        cache.set("a".to_string(), 2, Duration::from_secs(10));
        clock.advance(Duration::from_secs(7));
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn zero_ttl_is_immediately_invisible() {
        let (cache, _clock) = cache_with_clock();
        cache.set("a".to_string(), 1, Duration::ZERO);
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn delete_and_clear_remove_entries() {
        let (cache, _clock) = cache_with_clock();
        cache.set("a".to_string(), 1, Duration::from_secs(60));
        cache.set("b".to_string(), 2, Duration::from_secs(60));

        cache.delete("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache: Arc<TtlCache<u32, u32>> = Arc::new(TtlCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.set(t * 1000 + i, i, Duration::from_secs(60));
                        assert_eq!(cache.get(&(t * 1000 + i)), Some(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 800);
    }
}
