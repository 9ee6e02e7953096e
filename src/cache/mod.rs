//! Prediction caching
//!
//! Merged predictions are keyed by the model generation that produced them,
//! an xxh3 hash of the source text and the parameter count. A reload bumps
//! the generation, so stale entries are never returned; `retain_generation`
//! drops them. The cache holds at most `capacity` entries and evicts the
//! oldest insertions first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use xxhash_rust::xxh3::xxh3_64;

use crate::inference::Classification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    generation: u64,
    source_hash: u64,
    parameter_count: usize,
}

impl CacheKey {
    pub fn new(generation: u64, source: &str, parameter_count: usize) -> Self {
        Self {
            generation,
            source_hash: xxh3_64(source.as_bytes()),
            parameter_count,
        }
    }
}

pub const DEFAULT_CAPACITY: usize = 1024;

struct Entry {
    inserted: u64,
    prediction: Arc<Vec<Classification>>,
}

/// Thread-safe store of successful merged predictions
#[derive(Clone)]
pub struct PredictionCache {
    entries: Arc<DashMap<CacheKey, Entry>>,
    clock: Arc<AtomicU64>,
    capacity: usize,
}

impl Default for PredictionCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl PredictionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `capacity` predictions (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock: Arc::new(AtomicU64::new(0)),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Classification>>> {
        self.entries.get(key).map(|r| Arc::clone(&r.value().prediction))
    }

    pub fn insert(&self, key: CacheKey, prediction: Vec<Classification>) -> Arc<Vec<Classification>> {
        let prediction = Arc::new(prediction);
        let inserted = self.clock.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key,
            Entry {
                inserted,
                prediction: Arc::clone(&prediction),
            },
        );
        self.evict_overflow();
        prediction
    }

    /// Remove the oldest entries until the cache fits its capacity.
    fn evict_overflow(&self) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|r| r.value().inserted)
                .map(|r| *r.key());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Drop entries from every other generation.
    pub fn retain_generation(&self, generation: u64) {
        self.entries.retain(|key, _| key.generation == generation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
