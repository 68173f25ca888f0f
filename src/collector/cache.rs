//! Time-expiring record of queries that were already evaluated
//!
//! Least-frequently-used eviction: every lookup hit bumps an entry's
//! frequency, and when the cache is full the resident entry with the lowest
//! frequency (oldest first on ties) makes room. A new id is always admitted.
//! Entries expire a fixed time after insertion no matter how often they are
//! read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
struct Entry {
    first_seen: DateTime<Utc>,
    inserted: Instant,
    /// Insertion order, breaks frequency ties
    seq: u64,
    frequency: u64,
}

/// Query ids mapped to the time they were first evaluated
pub struct DedupCache {
    entries: Mutex<HashMap<String, Entry>>,
    capacity: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    next_seq: AtomicU64,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    pub fn with_config(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(capacity)),
            capacity: capacity.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            next_seq: AtomicU64::new(0),
        }
    }

    /// First-seen time of `query_id`, if it is still cached
    pub fn get_if_present(&self, query_id: &str) -> Option<DateTime<Utc>> {
        let mut entries = self.entries.lock();

        let expired = match entries.get_mut(query_id) {
            Some(entry) if entry.inserted.elapsed() < self.ttl => {
                entry.frequency += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.first_seen);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(query_id);
            tracing::debug!(query_id = %query_id, "Query expired from cache");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Mark `query_id` as seen at `at`.
    ///
    /// An id that is already cached keeps its original timestamp and expiry.
    pub fn set(&self, query_id: &str, at: DateTime<Utc>) {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(query_id) {
            if entry.inserted.elapsed() < self.ttl {
                return;
            }
        }

        if !entries.contains_key(query_id) && entries.len() >= self.capacity {
            self.purge_expired(&mut entries);
        }
        if !entries.contains_key(query_id) && entries.len() >= self.capacity {
            self.evict_least_frequent(&mut entries);
        }

        entries.insert(
            query_id.to_string(),
            Entry {
                first_seen: at,
                inserted: Instant::now(),
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                frequency: 0,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn purge_expired(&self, entries: &mut HashMap<String, Entry>) {
        let ttl = self.ttl;
        entries.retain(|query_id, entry| {
            let live = entry.inserted.elapsed() < ttl;
            if !live {
                tracing::debug!(query_id = %query_id, "Query expired from cache");
            }
            live
        });
    }

    fn evict_least_frequent(&self, entries: &mut HashMap<String, Entry>) {
        let victim = entries
            .iter()
            .min_by_key(|(_, entry)| (entry.frequency, entry.seq))
            .map(|(query_id, _)| query_id.clone());

        if let Some(query_id) = victim {
            entries.remove(&query_id);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(query_id = %query_id, "Evicted query from cache");
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.len(),
        }
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
    /// Entries removed to make room
    pub evictions: u64,
    pub entry_count: usize,
}
