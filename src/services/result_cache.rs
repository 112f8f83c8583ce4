// Result Cache
// Capacity-bounded LRU of finished scores, keyed by a fingerprint of the
// normalized text plus the options that shape the result.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::models::ScoreResult;

/// SHA-256 hex digest of normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(normalized: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub detailed: bool,
    /// Effective sentence cap; 0 when decomposition was not requested.
    pub max_sentences: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<CacheKey, (u64, ScoreResult)>,
    /// Access tick -> key; the smallest tick is the least recently used.
    order: BTreeMap<u64, CacheKey>,
    tick: u64,
}

impl LruState {
    fn touch(&mut self, key: &CacheKey) -> Option<ScoreResult> {
        self.tick += 1;
        let tick = self.tick;
        let (last, result) = self.entries.get_mut(key)?;
        let previous = *last;
        self.order.remove(&previous);
        *last = tick;
        self.order.insert(tick, key.clone());
        Some(result.clone())
    }

    fn evict_oldest(&mut self) -> bool {
        let Some((_, key)) = self.order.pop_first() else {
            return false;
        };
        self.entries.remove(&key);
        true
    }
}

/// Shared score cache. Owned by whoever builds the engine; clone the `Arc`
/// to share it between engines or tasks.
pub struct ResultCache {
    capacity: usize,
    state: Mutex<LruState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        info!("[result_cache] created with capacity {}", capacity);
        Self {
            capacity,
            state: Mutex::new(LruState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up and mark as most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<ScoreResult> {
        let found = match self.state.lock() {
            Ok(mut state) => state.touch(key),
            Err(_) => {
                warn!("[result_cache] lock poisoned, bypassing cache");
                None
            }
        };
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert, evicting the least recently used entry when full.
    pub fn insert(&self, key: CacheKey, result: ScoreResult) {
        if self.capacity == 0 {
            return;
        }
        let Ok(mut state) = self.state.lock() else {
            warn!("[result_cache] lock poisoned, dropping insert");
            return;
        };

        state.tick += 1;
        let tick = state.tick;
        if let Some((old_tick, _)) = state.entries.insert(key.clone(), (tick, result)) {
            state.order.remove(&old_tick);
        } else {
            while state.entries.len() > self.capacity {
                // the fresh key has no order slot yet, so it is never chosen
                if !state.evict_oldest() {
                    break;
                }
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        state.order.insert(tick, key);
    }

    /// Return the cached result or compute and store it. The computation runs
    /// outside the lock, so concurrent misses on one key may compute twice.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> ScoreResult
    where
        F: FnOnce() -> ScoreResult,
    {
        if let Some(hit) = self.get(&key) {
            debug!("[result_cache] hit {}", &key.fingerprint.as_str()[..12]);
            return hit;
        }
        let result = compute();
        self.insert(key, result.clone());
        result
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
            state.order.clear();
            info!("[result_cache] cleared");
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self.capacity,
        }
    }
}
