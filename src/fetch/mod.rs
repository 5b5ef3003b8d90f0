//! Tile fetch coordination.
//!
//! The coordinator walks a visible tile range, consults the cache, and
//! issues deduplicated asynchronous fetches for missing tiles. It also
//! owns the session token round trip. Completion handlers run on network
//! callback threads and mutate cache and token state under the same
//! mutexes the render thread uses; the render thread itself only takes
//! short lock-check-release steps and never waits on I/O.

mod decode;
mod http;

pub use decode::{decode_tile_payload, DecodeError};
pub use http::{FetchCallback, FetchError, HttpFetcher, ReqwestFetcher};

#[cfg(test)]
pub use decode::tests::png_bytes;
#[cfg(test)]
pub use http::tests::MockHttpFetcher;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::cache::{BoundedTileCache, TileEntry, TileKey};
use crate::config::OverlayConfig;
use crate::coord::{tile_to_base_rect, PixelRect, TileRange};
use crate::host::OverlayHost;
use crate::token::{parse_token_payload, SessionTokenManager, TokenCheck, TokenError};

/// Build the URL for one tile under one session token.
pub fn tile_url(base: &str, x: u32, y: u32, zoom: u8, token: &str) -> String {
    format!("{}&x={}&y={}&z={}&tm={}", base, x, y, zoom, token)
}

/// A tile to fetch: its cache key plus the base-projection rectangle the
/// host is told to redraw when the tile arrives.
///
/// Created per cache miss and consumed by the fetch completion handler.
#[derive(Debug, Clone)]
pub struct TileRequest {
    pub key: TileKey,
    pub rect: PixelRect,
}

/// Schedules tile and token fetches against the shared cache.
///
/// Cache and token state carry separate locks, so a token refresh never
/// blocks tile lookups and vice versa.
pub struct TileFetchCoordinator {
    cache: Arc<Mutex<BoundedTileCache>>,
    tokens: Arc<SessionTokenManager>,
    http: Arc<dyn HttpFetcher>,
    host: Arc<dyn OverlayHost>,
    tile_base_url: String,
    token_url: String,
    fetch_deadline: Duration,
}

impl TileFetchCoordinator {
    pub fn new(
        cache: Arc<Mutex<BoundedTileCache>>,
        tokens: Arc<SessionTokenManager>,
        http: Arc<dyn HttpFetcher>,
        host: Arc<dyn OverlayHost>,
        config: &OverlayConfig,
    ) -> Self {
        Self {
            cache,
            tokens,
            http,
            host,
            tile_base_url: config.tile_base_url.clone(),
            token_url: config.token_url.clone(),
            fetch_deadline: config.fetch_deadline,
        }
    }

    /// Resolve the session token for this frame, starting a refresh when
    /// it is absent or expired.
    ///
    /// Returns `None` while no token is usable (refresh in flight or
    /// failure cool-down); callers skip fetching and drawing this frame.
    pub fn resolve_token(&self, now: Instant) -> Option<String> {
        match self.tokens.check_and_maybe_refresh(now) {
            TokenCheck::Current(token) => Some(token),
            TokenCheck::Pending => None,
            TokenCheck::RefreshTriggered => {
                self.spawn_token_refresh(now);
                None
            }
        }
    }

    /// Make sure a fetch is in flight (or the tile already cached) for
    /// every tile of `range` under `token`.
    ///
    /// The check-then-insert of the `Pending` marker happens under one
    /// cache lock acquisition per tile, so concurrent render calls can
    /// never schedule a second fetch for the same key.
    pub fn ensure_tiles(&self, range: &TileRange, zoom: u8, token: &str) {
        let world = 1i64 << zoom.min(crate::coord::MAX_ZOOM);
        for ty in range.top..range.bottom {
            for tx in range.left..range.right {
                if tx < 0 || ty < 0 || (tx as i64) >= world || (ty as i64) >= world {
                    continue;
                }
                let Ok(rect) = tile_to_base_rect(tx as u32, ty as u32, zoom) else {
                    continue;
                };
                let key = TileKey::new(tx as u32, ty as u32, zoom, token);
                {
                    let mut cache = self.cache.lock().unwrap();
                    if cache.has_key(&key) {
                        // Pending or already loaded under this token;
                        // either way nothing to schedule.
                        continue;
                    }
                    cache.put(key.clone(), TileEntry::Pending);
                }
                self.spawn_tile_fetch(TileRequest { key, rect });
            }
        }
    }

    /// The bitmap for `key`, if loaded. Refreshes the entry's recency.
    pub fn lookup(&self, key: &TileKey) -> Option<Arc<RgbaImage>> {
        let mut cache = self.cache.lock().unwrap();
        cache.get(key).and_then(|entry| entry.bitmap().cloned())
    }

    /// Evict and release every cached tile. Called on overlay unload.
    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }

    fn spawn_tile_fetch(&self, request: TileRequest) {
        let url = tile_url(
            &self.tile_base_url,
            request.key.x,
            request.key.y,
            request.key.zoom,
            &request.key.token,
        );
        debug!(url = %url, "loading tile");

        let cache = Arc::clone(&self.cache);
        let host = Arc::clone(&self.host);
        self.http.fetch(
            &url,
            self.fetch_deadline,
            Box::new(move |result| {
                let TileRequest { key, rect } = request;
                // On any failure the Pending marker stays in place: the
                // key is retried after the token rotates or the entry
                // ages out, with no dedicated backoff.
                let payload = match result {
                    Ok(payload) => payload,
                    Err(error) => {
                        warn!(x = key.x, y = key.y, zoom = key.zoom, %error, "tile fetch failed");
                        return;
                    }
                };
                let bitmap = match decode_tile_payload(&payload) {
                    Ok(bitmap) => bitmap,
                    Err(error) => {
                        warn!(x = key.x, y = key.y, zoom = key.zoom, %error, "tile payload rejected");
                        return;
                    }
                };

                let zoom = key.zoom;
                let token = key.token.clone();
                cache.lock().unwrap().put(
                    key,
                    TileEntry::Loaded {
                        bitmap: Arc::new(bitmap),
                        token,
                    },
                );
                host.on_update(rect, zoom);
            }),
        );
    }

    /// Issue the single refresh request this caller was told to own.
    ///
    /// The triggering frame's `now` also stamps the result, so the
    /// renewal clock runs from the moment the refresh started, exactly
    /// like the age check that scheduled it.
    fn spawn_token_refresh(&self, now: Instant) {
        debug!(url = %self.token_url, "refreshing session token");

        let tokens = Arc::clone(&self.tokens);
        let host = Arc::clone(&self.host);
        self.http.fetch(
            &self.token_url,
            self.fetch_deadline,
            Box::new(move |result| {
                let parsed = result
                    .map_err(|e| TokenError::Endpoint(e.to_string()))
                    .and_then(|payload| parse_token_payload(&String::from_utf8_lossy(&payload)));
                let succeeded = parsed.is_ok();
                tokens.on_refresh_result(parsed, now);
                if succeeded {
                    // The new token invalidates what is on screen; ask
                    // the host for a fresh frame.
                    host.invalidate();
                }
            }),
        );
    }
}
