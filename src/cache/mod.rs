//! Keyed bitmap cache for traffic tiles.
//!
//! The cache holds at most a fixed number of entries, keyed by tile
//! coordinates plus the session token they were fetched under, with LRU
//! eviction and an optional release hook for evicted bitmaps. A `Pending`
//! entry doubles as the fetch-deduplication marker: while it is present,
//! exactly one request for that key is in flight.

mod bounded;
mod types;

pub use bounded::BoundedTileCache;
pub use types::{ReleaseHook, TileEntry, TileKey};
