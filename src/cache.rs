//! Caller-owned memoization of analysis results.
//!
//! Every component is deterministic, so a result can be reused whenever the
//! input series and parameters are unchanged. [`CacheKey`] fingerprints both;
//! [`ResultCache`] stores results under those keys with a capacity bound,
//! evicting the oldest insertion first.

use crate::core::TimeSeries;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

/// Fingerprint of one operation over its inputs and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Start a key for the named operation.
    pub fn builder(operation: &str) -> CacheKeyBuilder {
        let mut hasher = DefaultHasher::new();
        operation.hash(&mut hasher);
        CacheKeyBuilder { hasher }
    }
}

/// Accumulates inputs into a [`CacheKey`].
///
/// Floats are hashed by bit pattern, so `0.0` and `-0.0` differ and every
/// NaN with the same payload matches.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    hasher: DefaultHasher,
}

impl CacheKeyBuilder {
    /// Hash a series' timestamps and values.
    pub fn series(mut self, series: &TimeSeries) -> Self {
        series.len().hash(&mut self.hasher);
        for (t, v) in series.iter() {
            t.timestamp_nanos_opt().unwrap_or(i64::MIN).hash(&mut self.hasher);
            v.to_bits().hash(&mut self.hasher);
        }
        self
    }

    pub fn values(mut self, values: &[f64]) -> Self {
        values.len().hash(&mut self.hasher);
        for v in values {
            v.to_bits().hash(&mut self.hasher);
        }
        self
    }

    /// Hash a named parameter.
    pub fn param<T: Hash + ?Sized>(mut self, name: &str, value: &T) -> Self {
        name.hash(&mut self.hasher);
        value.hash(&mut self.hasher);
        self
    }

    /// Hash a named floating-point parameter.
    pub fn float(mut self, name: &str, value: f64) -> Self {
        name.hash(&mut self.hasher);
        value.to_bits().hash(&mut self.hasher);
        self
    }

    pub fn finish(self) -> CacheKey {
        CacheKey(self.hasher.finish())
    }
}

/// Hit and miss counts of a [`ResultCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit; zero before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct Entries<V> {
    values: HashMap<CacheKey, V>,
    order: VecDeque<CacheKey>,
}

/// Capacity-bounded result store, safe to share between threads.
///
/// Eviction removes the least recently inserted entry; lookups do not
/// refresh an entry's position.
#[derive(Debug)]
pub struct ResultCache<V> {
    capacity: usize,
    entries: RwLock<Entries<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> ResultCache<V> {
    /// A cache holding at most `capacity` results. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(Entries {
                values: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries<V>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries<V>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.read().values.contains_key(key)
    }

    /// Look up a result, counting the hit or miss.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let found = self.read().values.get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store a result. Replacing an existing key keeps its insertion slot.
    pub fn insert(&self, key: CacheKey, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.write();
        if let Some(slot) = entries.values.get_mut(&key) {
            *slot = value;
            return;
        }
        while entries.values.len() >= self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.values.remove(&oldest);
            trace!(key = oldest.0, "evicted cached result");
        }
        entries.order.push_back(key);
        entries.values.insert(key, value);
    }

    /// Return the cached result or compute, store and return it.
    ///
    /// A failed computation is returned as is and nothing is stored.
    pub fn get_or_try_insert_with<E, F>(&self, key: CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Drop one entry, returning it if present.
    pub fn invalidate(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.write();
        let removed = entries.values.remove(key);
        if removed.is_some() {
            entries.order.retain(|k| k != key);
        }
        removed
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&self) {
        let mut entries = self.write();
        entries.values.clear();
        entries.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
