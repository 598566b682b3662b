//! Bounded LRU cache of decompressed chunk payloads.
//!
//! Keeps re-decoded payload bytes for retried coordinates out of the
//! region-file hot path. One lock guards the whole structure; at the
//! supported worker counts (≤32) contention is negligible.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::coord::ChunkCoord;

/// Default number of payloads kept resident.
pub const DEFAULT_CAPACITY: usize = 1000;

struct Entry {
    data: Vec<u8>,
    /// Monotonic access stamp; the lowest stamp is the LRU victim.
    last_used: u64,
}

struct Inner {
    map: HashMap<ChunkCoord, Entry>,
    clock: u64,
}

/// Shared payload cache with strict least-recently-used eviction.
pub struct ExtractionCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl ExtractionCache {
    /// Create a cache holding at most `capacity` payloads.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                clock: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Fetch a payload, refreshing its recency on hit.
    pub fn get(&self, coord: ChunkCoord) -> Option<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;
        let entry = inner.map.get_mut(&coord)?;
        entry.last_used = clock;
        Some(entry.data.clone())
    }

    /// Insert a payload, evicting the least-recently-used entry if the
    /// cache is full. Re-inserting an existing key refreshes it.
    pub fn put(&self, coord: ChunkCoord, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.clock += 1;
        let clock = inner.clock;
        inner.map.insert(
            coord,
            Entry {
                data,
                last_used: clock,
            },
        );
        while inner.map.len() > self.capacity {
            let victim = inner
                .map
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k);
            match victim {
                Some(k) => {
                    inner.map.remove(&k);
                }
                None => break,
            }
        }
    }

    /// Number of cached payloads.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ExtractionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(i: i32) -> ChunkCoord {
        ChunkCoord::new(i, -i)
    }

    #[test]
    fn test_put_and_get() {
        let cache = ExtractionCache::new(10);
        cache.put(coord(1), vec![1, 2, 3]);
        assert_eq!(cache.get(coord(1)), Some(vec![1, 2, 3]));
        assert_eq!(cache.get(coord(2)), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let cache = ExtractionCache::new(3);
        for i in 0..20 {
            cache.put(coord(i), vec![i as u8]);
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_least_recently_used_evicted_first() {
        let cache = ExtractionCache::new(2);
        cache.put(coord(1), vec![1]);
        cache.put(coord(2), vec![2]);
        // Touch 1 so 2 becomes the LRU entry
        assert!(cache.get(coord(1)).is_some());
        cache.put(coord(3), vec![3]);

        assert!(cache.get(coord(1)).is_some());
        assert!(cache.get(coord(2)).is_none());
        assert!(cache.get(coord(3)).is_some());
    }

    #[test]
    fn test_reinsert_refreshes_recency() {
        let cache = ExtractionCache::new(2);
        cache.put(coord(1), vec![1]);
        cache.put(coord(2), vec![2]);
        cache.put(coord(1), vec![9]); // refresh 1, now 2 is LRU
        cache.put(coord(3), vec![3]);

        assert_eq!(cache.get(coord(1)), Some(vec![9]));
        assert!(cache.get(coord(2)).is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_clamped_to_one() {
        let cache = ExtractionCache::new(0);
        cache.put(coord(1), vec![1]);
        assert_eq!(cache.len(), 1);
        cache.put(coord(2), vec![2]);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(coord(2)).is_some());
    }
}
