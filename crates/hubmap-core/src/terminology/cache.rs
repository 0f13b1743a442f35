//! Bounded cache of terminology translations
//!
//! Entries are evicted in insertion order once the capacity is reached.
//! Reads never refresh an entry's position.
//!
//! Copyright (c) 2025 Hubmap Team
//! Licensed under the Apache-2.0 license

use super::{CacheKey, TransformCode};
use once_cell::sync::OnceCell;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Default number of cached translations
pub const DEFAULT_CAPACITY: usize = 100_000;

static GLOBAL_CACHE: OnceCell<Arc<TerminologyCache>> = OnceCell::new();

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, TransformCode>,
    /// Keys in insertion order, oldest first
    order: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Thread-safe, insertion-ordered translation cache
#[derive(Debug)]
pub struct TerminologyCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl TerminologyCache {
    /// Create a cache holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Process-wide cache shared by every converter that does not inject its own
    ///
    /// Created with [`DEFAULT_CAPACITY`] unless [`TerminologyCache::global_with_capacity`]
    /// ran first.
    pub fn global() -> Arc<TerminologyCache> {
        Self::global_with_capacity(DEFAULT_CAPACITY)
    }

    /// Process-wide cache, created with `capacity` on first use
    ///
    /// The capacity of an existing cache never changes.
    pub fn global_with_capacity(capacity: usize) -> Arc<TerminologyCache> {
        let cache = GLOBAL_CACHE.get_or_init(|| {
            log::debug!("Creating process-wide terminology cache of {} entries", capacity);
            Arc::new(TerminologyCache::new(capacity))
        });
        if cache.capacity() != capacity.max(1) {
            log::warn!(
                "Terminology cache already created with capacity {}; ignoring {}",
                cache.capacity(),
                capacity
            );
        }
        Arc::clone(cache)
    }

    pub fn get(&self, key: &CacheKey) -> Option<TransformCode> {
        let mut inner = self.lock();
        match inner.entries.get(key).cloned() {
            Some(found) => {
                inner.hits += 1;
                Some(found)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a translation, evicting the oldest entries beyond capacity
    ///
    /// Replacing an existing key keeps its original position.
    pub fn insert(&self, key: CacheKey, value: TransformCode) {
        let mut inner = self.lock();
        if let Some(existing) = inner.entries.get_mut(&key) {
            *existing = value;
            return;
        }

        while inner.entries.len() >= self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            inner.evictions += 1;
            log::trace!("Evicted terminology entry {}", oldest);
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(key, value);
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    // Recovers the guard from a poisoned lock
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TerminologyCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: &str) -> CacheKey {
        CacheKey::new("ICD10", code, "SNOMED")
    }

    fn code(code: &str) -> TransformCode {
        TransformCode::new(code, "SNOMED", "")
    }

    #[test]
    fn test_get_and_insert() {
        let cache = TerminologyCache::new(10);
        assert!(cache.get(&key("A00")).is_none());

        cache.insert(key("A00"), code("409709003"));
        assert_eq!(cache.get(&key("A00")).unwrap().code, "409709003");
        assert!(cache.contains(&key("A00")));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let cache = TerminologyCache::new(3);
        for c in ["A", "B", "C"] {
            cache.insert(key(c), code(c));
        }
        // Reading does not refresh position
        assert!(cache.get(&key("A")).is_some());

        cache.insert(key("D"), code("D"));

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&key("A")));
        assert!(cache.contains(&key("D")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let cache = TerminologyCache::new(2);
        cache.insert(key("A"), code("1"));
        cache.insert(key("B"), code("2"));
        cache.insert(key("A"), code("3"));
        assert_eq!(cache.get(&key("A")).unwrap().code, "3");

        cache.insert(key("C"), code("4"));
        assert!(!cache.contains(&key("A")));
        assert!(cache.contains(&key("B")));
    }

    #[test]
    fn test_blank_results_are_cached() {
        let cache = TerminologyCache::new(2);
        cache.insert(key("Z99"), TransformCode::blank());
        assert!(cache.get(&key("Z99")).unwrap().is_blank());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let cache = TerminologyCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(key("A"), code("1"));
        cache.insert(key("B"), code("2"));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key("B")));
    }
}
