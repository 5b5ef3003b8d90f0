//! Bounded in-memory tile cache with LRU eviction.

use std::collections::HashMap;

use tracing::trace;

use crate::cache::types::{ReleaseHook, TileEntry, TileKey};

struct Slot {
    entry: TileEntry,
    /// Monotonic access stamp; the smallest stamp is the LRU entry.
    last_accessed: u64,
}

/// Capacity-limited key-to-entry store.
///
/// Recency is tracked with a monotonic counter, bumped on insert and on
/// read, so recently viewed tiles survive eviction pressure. When an
/// insert exceeds capacity the least-recently-used entry is evicted and
/// the release hook runs on it (for `Loaded` entries) before the slot is
/// discarded.
///
/// The structure is not internally thread-safe. Call sites wrap it in a
/// single `Mutex` and hold the guard across each check-then-act sequence,
/// which is what makes the "at most one fetch per pending key" invariant
/// hold under concurrent render calls.
pub struct BoundedTileCache {
    entries: HashMap<TileKey, Slot>,
    capacity: usize,
    clock: u64,
    release_hook: Option<ReleaseHook>,
}

impl BoundedTileCache {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be at least 1");
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
            clock: 0,
            release_hook: None,
        }
    }

    /// Create a cache with a release hook invoked on every evicted or
    /// cleared `Loaded` entry.
    pub fn with_release_hook(capacity: usize, hook: ReleaseHook) -> Self {
        let mut cache = Self::new(capacity);
        cache.release_hook = Some(hook);
        cache
    }

    /// Look up an entry, refreshing its recency.
    pub fn get(&mut self, key: &TileKey) -> Option<&TileEntry> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|slot| {
            slot.last_accessed = clock;
            &slot.entry
        })
    }

    /// Whether the key is present (pending or loaded). Does not touch
    /// recency.
    pub fn has_key(&self, key: &TileKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace an entry, evicting the least-recently-used slot
    /// if the cache is full.
    pub fn put(&mut self, key: TileKey, entry: TileEntry) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_lru();
        }

        self.clock += 1;
        let slot = Slot {
            entry,
            last_accessed: self.clock,
        };
        if let Some(old) = self.entries.insert(key.clone(), slot) {
            // Replacing a slot in place, typically Pending -> Loaded.
            self.release(&key, old.entry);
        }
    }

    /// Evict and release every entry.
    pub fn clear(&mut self) {
        let drained: Vec<(TileKey, TileEntry)> = self
            .entries
            .drain()
            .map(|(key, slot)| (key, slot.entry))
            .collect();
        for (key, entry) in drained {
            self.release(&key, entry);
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_accessed)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            if let Some(slot) = self.entries.remove(&key) {
                trace!(x = key.x, y = key.y, zoom = key.zoom, "evicting tile");
                self.release(&key, slot.entry);
            }
        }
    }

    fn release(&mut self, key: &TileKey, entry: TileEntry) {
        if entry.is_pending() {
            return;
        }
        if let Some(hook) = self.release_hook.as_mut() {
            hook(key, entry);
        }
    }
}
