//! TTL-bounded LRU cache for lookup results.

use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;

use crate::clock::{self, Clock};
use crate::observability::metrics;

/// A cached value and the instant (since epoch) after which it is stale.
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Duration) -> bool {
        now > self.expires_at
    }
}

/// Point-in-time view of the cache for the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_secs: u64,
}

/// A thread-safe cache whose entries expire after a fixed TTL and which
/// evicts the least recently used entry once it is full.
///
/// Every operation takes the internal lock exactly once and never performs
/// I/O while holding it. Readers receive clones, never references into the
/// store.
pub struct TtlLruCache<K, V> {
    inner: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, clock::system())
    }

    pub fn with_clock(capacity: NonZeroUsize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    /// Look up a live entry and mark it most recently used.
    ///
    /// An entry found past its expiry is removed on the spot and reported
    /// as absent.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let mut entries = self.inner.lock().expect("cache mutex poisoned");

        let expired = entries.peek(key)?.is_expired(now);
        if expired {
            entries.pop(key);
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or refresh an entry.
    ///
    /// Re-setting a key replaces its value, restarts its TTL and promotes it.
    /// Inserting a new key into a full cache first evicts the least recently
    /// used entry.
    pub fn set(&self, key: K, value: V) {
        let entry = Entry {
            value,
            expires_at: self.clock.now() + self.ttl,
        };
        let mut entries = self.inner.lock().expect("cache mutex poisoned");

        let existed = entries.contains(&key);
        if entries.push(key, entry).is_some() && !existed {
            metrics::record_cache_eviction();
        }
        metrics::record_cache_size(entries.len());
    }

    /// Remove every entry, returning how many were stored.
    pub fn clear(&self) -> usize {
        let mut entries = self.inner.lock().expect("cache mutex poisoned");
        let removed = entries.len();
        entries.clear();
        metrics::record_cache_size(0);
        removed
    }

    /// Drop every entry whose TTL has passed. Returns how many were removed.
    ///
    /// Live entries keep their recency order.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.inner.lock().expect("cache mutex poisoned");

        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        metrics::record_cache_size(entries.len());
        expired.len()
    }

    /// Number of physically stored entries, expired or not.
    pub fn size(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").len()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.lock().expect("cache mutex poisoned");
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

impl<K, V> std::fmt::Debug for TtlLruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlLruCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn cache_with_clock(
        capacity: usize,
        ttl_secs: u64,
    ) -> (TtlLruCache<String, serde_json::Value>, ManualClock) {
        let clock = ManualClock::new(Duration::from_secs(1_700_000_000));
        let cache = TtlLruCache::with_clock(
            NonZeroUsize::new(capacity).unwrap(),
            Duration::from_secs(ttl_secs),
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    #[test]
    fn test_round_trip_returns_stored_value() {
        let (cache, _clock) = cache_with_clock(4, 60);
        let doc = json!({"ret": 200, "data": {"ip": "8.8.8.8", "country": "US"}});

        cache.set("8.8.8.8".to_string(), doc.clone());
        assert_eq!(cache.get("8.8.8.8"), Some(doc));
        assert_eq!(cache.get("1.1.1.1"), None);
    }

    #[test]
    fn test_capacity_evicts_first_inserted() {
        let (cache, _clock) = cache_with_clock(3, 60);
        for i in 0..4 {
            cache.set(format!("10.0.0.{i}"), json!(i));
        }

        assert_eq!(cache.size(), 3);
        assert!(cache.get("10.0.0.0").is_none());
        for i in 1..4 {
            assert_eq!(cache.get(format!("10.0.0.{i}").as_str()), Some(json!(i)));
        }
    }

    #[test]
    fn test_get_promotes_entry() {
        let (cache, _clock) = cache_with_clock(2, 60);
        cache.set("A".to_string(), json!("a"));
        cache.set("B".to_string(), json!("b"));

        assert!(cache.get("A").is_some());
        cache.set("C".to_string(), json!("c"));

        assert!(cache.get("B").is_none());
        assert_eq!(cache.get("A"), Some(json!("a")));
        assert_eq!(cache.get("C"), Some(json!("c")));
    }

    #[test]
    fn test_reset_existing_key_refreshes_value_and_recency() {
        let (cache, clock) = cache_with_clock(2, 10);
        cache.set("A".to_string(), json!(1));
        cache.set("B".to_string(), json!(2));

        clock.advance(Duration::from_secs(8));
        cache.set("A".to_string(), json!(3));
        cache.set("C".to_string(), json!(4));

        // B was the least recently used once A was re-set.
        assert!(cache.get("B").is_none());

        // A's TTL restarted at the re-set, so it outlives its original expiry.
        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.get("A"), Some(json!(3)));
    }

    #[test]
    fn test_expired_entry_is_absent_but_counted_until_read() {
        let (cache, clock) = cache_with_clock(4, 1);
        cache.set("A".to_string(), json!("a"));
        cache.set("B".to_string(), json!("b"));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.size(), 2);

        assert!(cache.get("A").is_none());
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_entry_alive_exactly_at_expiry() {
        let (cache, clock) = cache_with_clock(4, 5);
        cache.set("A".to_string(), json!("a"));

        clock.advance(Duration::from_secs(5));
        assert!(cache.get("A").is_some());

        clock.advance(Duration::from_millis(1));
        assert!(cache.get("A").is_none());
    }

    #[test]
    fn test_cleanup_expired_removes_only_stale_entries() {
        let (cache, clock) = cache_with_clock(8, 10);
        for i in 0..5 {
            cache.set(format!("old-{i}"), json!(i));
        }
        clock.advance(Duration::from_secs(6));
        cache.set("fresh".to_string(), json!("fresh"));
        clock.advance(Duration::from_secs(6));

        assert_eq!(cache.cleanup_expired(), 5);
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get("fresh"), Some(json!("fresh")));
    }

    #[test]
    fn test_cleanup_all_expired_empties_cache() {
        let (cache, clock) = cache_with_clock(8, 1);
        for i in 0..6 {
            cache.set(format!("k{i}"), json!(i));
        }
        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.cleanup_expired(), 6);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn test_cleanup_keeps_recency_of_live_entries() {
        let (cache, clock) = cache_with_clock(3, 10);
        cache.set("stale".to_string(), json!(0));
        clock.advance(Duration::from_secs(6));
        cache.set("A".to_string(), json!(1));
        cache.set("B".to_string(), json!(2));
        assert!(cache.get("A").is_some());
        clock.advance(Duration::from_secs(6));

        assert_eq!(cache.cleanup_expired(), 1);
        cache.set("C".to_string(), json!(3));
        cache.set("D".to_string(), json!(4));

        // B was least recent among the survivors.
        assert!(cache.get("B").is_none());
        assert!(cache.get("A").is_some());
    }

    #[test]
    fn test_clear_and_stats() {
        let (cache, _clock) = cache_with_clock(5, 3600);
        cache.set("A".to_string(), json!(1));
        cache.set("B".to_string(), json!(2));

        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 2,
                capacity: 5,
                ttl_secs: 3600
            }
        );

        cache.clear();
        assert_eq!(cache.size(), 0);
        assert!(cache.get("A").is_none());
    }

    #[test]
    fn test_concurrent_sets_respect_capacity() {
        let (cache, _clock) = cache_with_clock(16, 60);
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let key = format!("{t}-{i}");
                        cache.set(key.clone(), json!(i));
                        let _ = cache.get(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.size(), 16);
    }
}
