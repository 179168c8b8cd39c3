//! TTL Cache
//!
//! In-memory expiring key/value store shielding the market data APIs from
//! repeated requests. Coarse-grained locking: one mutex per cache, which is
//! plenty at the call rates involved (a handful of fetches per report).

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use rust_decimal::Decimal;

use crate::model::AssetSnapshot;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe expiring map with string keys.
///
/// The cache never fails: a missing or expired key is a plain miss, and a
/// `set` always succeeds (evicting under capacity pressure). Expired entries
/// stay readable through [`TtlCache::get_stale`] until eviction, which is the
/// last-resort fallback when a source is down.
pub struct TtlCache<V> {
    max_items: usize,
    inner: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache holding at most `max_items` entries.
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items: max_items.max(1),
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh value for `key`, or a miss. Expired entries found here are
    /// removed lazily.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut map = self.lock();
        match map.get(key) {
            Some(entry) if entry.expires_at >= Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Value for `key` even when expired. Used only after retries are
    /// exhausted; a stale quote beats no quote.
    pub fn get_stale(&self, key: &str) -> Option<V> {
        self.lock().get(key).map(|e| e.value.clone())
    }

    /// Insert `value` under `key` for `ttl`. Evicts when at capacity.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut map = self.lock();
        if map.len() >= self.max_items && !map.contains_key(&key) {
            Self::evict(&mut map, self.max_items);
        }
        map.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove `key` if present.
    pub fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry<V>>> {
        // A panic while holding the lock leaves the map intact, so the
        // poisoned state is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capacity policy: purge expired entries first; if still at capacity,
    /// drop the 20% of entries with the nearest expiry (shortest remaining
    /// useful life), at least one.
    fn evict(map: &mut HashMap<String, Entry<V>>, max_items: usize) {
        let now = Instant::now();
        map.retain(|_, entry| entry.expires_at >= now);
        if map.len() < max_items {
            return;
        }

        let mut by_expiry: Vec<(Instant, String)> = map
            .iter()
            .map(|(k, e)| (e.expires_at, k.clone()))
            .collect();
        by_expiry.sort();

        let remove_n = (map.len() / 5).max(1);
        for (_, key) in by_expiry.into_iter().take(remove_n) {
            map.remove(&key);
        }
    }
}

/// The engine's cache service: one typed cache per value shape, constructed
/// once and shared by reference with every adapter call site.
pub struct MarketCache {
    /// Bulk top-N snapshots, keyed by quote currency.
    pub snapshots: TtlCache<Vec<AssetSnapshot>>,
    /// Spot prices, keyed by `source:symbol`.
    pub spot: TtlCache<Decimal>,
}

impl MarketCache {
    pub fn new(max_items: usize) -> Self {
        Self {
            snapshots: TtlCache::new(max_items),
            spot: TtlCache::new(max_items),
        }
    }
}

impl Default for MarketCache {
    fn default() -> Self {
        Self::new(512)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_get_fresh_value() {
        let cache = TtlCache::new(16);
        cache.set("k", 42u32, Duration::from_secs(5));
        assert_eq!(cache.get("k"), Some(42));
    }

    #[test]
    fn test_expired_entry_is_a_miss_but_stale_readable() {
        let cache = TtlCache::new(16);
        cache.set("k", 7u32, Duration::from_millis(20));
        sleep(Duration::from_millis(50));

        // get_stale first: get() removes the expired entry it discovers
        assert_eq!(cache.get_stale("k"), Some(7));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.get_stale("k"), None);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = TtlCache::new(16);
        cache.set("a", 1u32, Duration::from_secs(5));
        cache.set("b", 2u32, Duration::from_secs(5));
        cache.delete("a");
        assert_eq!(cache.get("a"), None);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_purges_expired_first() {
        let cache = TtlCache::new(4);
        cache.set("dead", 0u32, Duration::from_millis(1));
        cache.set("a", 1u32, Duration::from_secs(60));
        cache.set("b", 2u32, Duration::from_secs(60));
        cache.set("c", 3u32, Duration::from_secs(60));
        sleep(Duration::from_millis(10));

        cache.set("d", 4u32, Duration::from_secs(60));
        assert_eq!(cache.get_stale("dead"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("d"), Some(4));
    }

    #[test]
    fn test_eviction_drops_nearest_expiry_not_insertion_order() {
        let cache = TtlCache::new(10);
        // Inserted first but expiring last, must survive.
        cache.set("long", 0u32, Duration::from_secs(600));
        for i in 0..9u32 {
            cache.set(format!("short{i}"), i, Duration::from_secs(10 + u64::from(i)));
        }

        cache.set("new", 99u32, Duration::from_secs(600));

        // 20% of 10 = 2 nearest-expiry entries gone.
        assert_eq!(cache.get_stale("short0"), None);
        assert_eq!(cache.get_stale("short1"), None);
        assert_eq!(cache.get("long"), Some(0));
        assert_eq!(cache.get("new"), Some(99));
        assert_eq!(cache.len(), 9);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = TtlCache::new(2);
        cache.set("a", 1u32, Duration::from_secs(5));
        cache.set("b", 2u32, Duration::from_secs(5));
        cache.set("b", 3u32, Duration::from_secs(5));
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), Some(3));
    }
}
