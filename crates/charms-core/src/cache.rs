//! Time-bounded memoization for fetched data.
//!
//! A [`TtlCache`] is an ordinary value owned by whichever component needs
//! it. There is no shared default instance: callers construct one with an
//! explicit time-to-live and invalidate entries explicitly.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::trace;

/// One cached value and the moment it was stored.
#[derive(Debug, Clone)]
struct Entry<V> {
    stored_at: Instant,
    value: V,
}

/// Key-value cache whose entries expire `ttl` after insertion.
#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, Entry<V>>,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    /// Create an empty cache.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Time-to-live applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Change the time-to-live. Existing entries are judged by the new value.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    /// Fresh value for `key`, if any.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|e| self.is_fresh(e, now))
            .map(|e| &e.value)
    }

    fn is_fresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl
    }

    /// Store `value`, replacing any previous entry.
    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    fn insert_at(&mut self, key: K, value: V, now: Instant) {
        self.entries.insert(
            key,
            Entry {
                stored_at: now,
                value,
            },
        );
    }

    /// Return the fresh value for `key`, computing and storing it on a miss.
    pub fn get_or_insert_with<F>(&mut self, key: K, fetch: F) -> &V
    where
        F: FnOnce() -> V,
    {
        let now = Instant::now();
        let fresh = self.entries.get(&key).is_some_and(|e| self.is_fresh(e, now));
        if !fresh {
            trace!("cache miss");
            self.insert_at_ref(key, fetch(), now)
        } else {
            // Present and fresh, checked above.
            &self.entries[&key].value
        }
    }

    /// Fallible variant of [`get_or_insert_with`](Self::get_or_insert_with).
    /// Errors are returned without touching the cache.
    pub fn try_get_or_insert_with<F, E>(&mut self, key: K, fetch: F) -> Result<&V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let now = Instant::now();
        let fresh = self.entries.get(&key).is_some_and(|e| self.is_fresh(e, now));
        if !fresh {
            trace!("cache miss");
            let value = fetch()?;
            Ok(self.insert_at_ref(key, value, now))
        } else {
            Ok(&self.entries[&key].value)
        }
    }

    fn insert_at_ref(&mut self, key: K, value: V, now: Instant) -> &V {
        let entry = Entry {
            stored_at: now,
            value,
        };
        match self.entries.entry(key) {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                slot.insert(entry);
                &slot.into_mut().value
            }
            std::collections::hash_map::Entry::Vacant(slot) => &slot.insert(entry).value,
        }
    }

    /// Drop the entry for `key`. Returns whether one existed.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Remove expired entries and return how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.stored_at) < ttl);
        before - self.entries.len()
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn fresh_entry_is_returned() {
        let mut cache = TtlCache::new(HOUR);
        cache.insert("k", 1);
        assert_eq!(cache.get(&"k"), Some(&1));
    }

    #[test]
    fn zero_ttl_never_hits() {
        let mut cache = TtlCache::new(Duration::ZERO);
        cache.insert("k", 1);
        assert_eq!(cache.get(&"k"), None);
    }

    #[test]
    fn entry_expires_after_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(30));
        let start = Instant::now();
        cache.insert_at("k", 1, start);
        assert_eq!(cache.get_at(&"k", start + Duration::from_secs(29)), Some(&1));
        assert_eq!(cache.get_at(&"k", start + Duration::from_secs(30)), None);
    }

    #[test]
    fn get_or_insert_with_fetches_once() {
        let mut cache = TtlCache::new(HOUR);
        let mut calls = 0;
        let v = *cache.get_or_insert_with("k", || {
            calls += 1;
            10
        });
        assert_eq!(v, 10);
        let v = *cache.get_or_insert_with("k", || {
            calls += 1;
            20
        });
        assert_eq!(v, 10);
        assert_eq!(calls, 1);
    }

    #[test]
    fn stale_entry_is_refetched() {
        let mut cache = TtlCache::new(Duration::ZERO);
        cache.insert("k", 1);
        let v = *cache.get_or_insert_with("k", || 2);
        assert_eq!(v, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn try_get_or_insert_error_leaves_cache_empty() {
        let mut cache: TtlCache<&str, u32> = TtlCache::new(HOUR);
        let res: Result<&u32, &str> = cache.try_get_or_insert_with("k", || Err("offline"));
        assert_eq!(res, Err("offline"));
        assert!(cache.is_empty());

        let v = cache.try_get_or_insert_with::<_, &str>("k", || Ok(7)).unwrap();
        assert_eq!(*v, 7);
    }

    #[test]
    fn invalidate_single_and_all() {
        let mut cache = TtlCache::new(HOUR);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert!(cache.invalidate(&"a"));
        assert!(!cache.invalidate(&"a"));
        assert_eq!(cache.len(), 1);
        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_expired_counts_dropped() {
        let mut cache = TtlCache::new(Duration::ZERO);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.purge_expired(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn set_ttl_applies_to_existing_entries() {
        let mut cache = TtlCache::new(HOUR);
        cache.insert("a", 1);
        cache.set_ttl(Duration::ZERO);
        assert_eq!(cache.ttl(), Duration::ZERO);
        assert_eq!(cache.get(&"a"), None);
    }
}
