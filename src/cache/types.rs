//! Core types for the tile cache.

use std::sync::Arc;

use image::RgbaImage;

use crate::coord::MAX_ZOOM;

/// Cache key uniquely identifying a tile.
///
/// The session token is part of the key: a tile fetched under one token is
/// a different cache entry from the same coordinates fetched under another,
/// so a token rotation can never surface a stale tile under the new token.
/// Entries keyed by retired tokens are not looked up again and age out
/// through LRU eviction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Tile column in the provider grid, in [0, 2^zoom).
    pub x: u32,
    /// Tile row in the provider grid, in [0, 2^zoom).
    pub y: u32,
    /// Zoom level.
    pub zoom: u8,
    /// Session token the tile is (being) fetched under.
    pub token: String,
}

impl TileKey {
    /// Create a new tile key.
    pub fn new(x: u32, y: u32, zoom: u8, token: impl Into<String>) -> Self {
        debug_assert!(zoom <= MAX_ZOOM);
        debug_assert!(x < (1u32 << zoom) && y < (1u32 << zoom));
        Self {
            x,
            y,
            zoom,
            token: token.into(),
        }
    }
}

/// A cache slot for one tile key.
///
/// `Pending` marks a fetch in flight: exactly one request is outstanding
/// for the key while this state is present, and no second fetch may be
/// scheduled. `Loaded` owns the decoded bitmap together with the token it
/// was fetched under.
#[derive(Debug, Clone)]
pub enum TileEntry {
    /// Fetch in flight, no data yet.
    Pending,
    /// Decoded tile bitmap.
    Loaded {
        bitmap: Arc<RgbaImage>,
        /// Token the bitmap was fetched under.
        token: String,
    },
}

impl TileEntry {
    pub fn is_pending(&self) -> bool {
        matches!(self, TileEntry::Pending)
    }

    /// The bitmap, if this entry is loaded.
    pub fn bitmap(&self) -> Option<&Arc<RgbaImage>> {
        match self {
            TileEntry::Pending => None,
            TileEntry::Loaded { bitmap, .. } => Some(bitmap),
        }
    }
}

/// Hook invoked when a `Loaded` entry leaves the cache, receiving the
/// evicted entry so the host can release any resource backing the bitmap.
/// Called exactly once per evicted or cleared `Loaded` entry.
pub type ReleaseHook = Box<dyn FnMut(&TileKey, TileEntry) + Send>;
