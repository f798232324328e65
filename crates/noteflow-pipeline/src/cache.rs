//! Content-hash result cache.
//!
//! Deterministic de-duplication keyed by the SHA-256 of normalized input.
//! Bounded by entry count and age; eviction is least-recently-used, where
//! "use" includes reads. Two tasks with identical normalized input share
//! identical results for the lifetime of the entry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use noteflow_core::{ContentHash, TaskResult};

struct CacheEntry {
    result: TaskResult,
    created_at: Instant,
    /// Logical access clock value of the most recent read or write.
    last_access: u64,
}

struct CacheInner {
    map: HashMap<ContentHash, CacheEntry>,
    /// Monotonic logical clock for LRU ordering.
    clock: u64,
}

/// Bounded LRU cache of completed task results.
pub struct ResultCache {
    inner: Mutex<CacheInner>,
    max_entries: usize,
    ttl: Duration,
}

impl ResultCache {
    /// Cache bounded to `max_entries` items and `ttl` entry age.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                clock: 0,
            }),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    /// Look up a result, refreshing its LRU position on hit.
    /// Expired entries are removed on access.
    pub fn get(&self, hash: &ContentHash) -> Option<TaskResult> {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;

        if let Some(entry) = inner.map.get_mut(hash) {
            if entry.created_at.elapsed() < self.ttl {
                entry.last_access = clock;
                return Some(entry.result.clone());
            }
        } else {
            return None;
        }
        inner.map.remove(hash);
        None
    }

    /// Insert a result, evicting the least-recently-used entry when full.
    pub fn insert(&self, hash: ContentHash, result: TaskResult) {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;

        if !inner.map.contains_key(&hash) && inner.map.len() >= self.max_entries {
            if let Some(oldest) = inner
                .map
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| *k)
            {
                inner.map.remove(&oldest);
                debug!("evicted least-recently-used cache entry");
            }
        }

        inner.map.insert(
            hash,
            CacheEntry {
                result,
                created_at: Instant::now(),
                last_access: clock,
            },
        );
    }

    /// Number of live entries (including any not yet expired-on-access).
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().map.is_empty()
    }
}
