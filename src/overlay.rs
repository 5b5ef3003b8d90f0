//! High-level overlay facade.
//!
//! Wires the cache, token manager, fetch coordinator, and renderer into
//! a single object the host application constructs and drives. The host
//! supplies the two collaborators the engine does not own: an
//! [`HttpFetcher`] for transport and an [`OverlayHost`] for redraw
//! notifications.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::cache::{BoundedTileCache, ReleaseHook};
use crate::config::OverlayConfig;
use crate::coord::PixelPoint;
use crate::fetch::{HttpFetcher, TileFetchCoordinator};
use crate::host::OverlayHost;
use crate::render::{TileCanvas, ViewportRenderer};
use crate::token::SessionTokenManager;

/// A traffic tile overlay bound to one tile provider session.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use trafficlayer::config::OverlayConfig;
/// use trafficlayer::fetch::ReqwestFetcher;
/// use trafficlayer::overlay::TrafficOverlay;
///
/// let http = Arc::new(ReqwestFetcher::new()?);
/// let overlay = TrafficOverlay::new(OverlayConfig::default(), http, host);
/// overlay.draw(&mut canvas, zoom, origin, size);
/// ```
pub struct TrafficOverlay {
    renderer: ViewportRenderer,
    coordinator: Arc<TileFetchCoordinator>,
}

impl TrafficOverlay {
    /// Create an overlay with the given configuration and collaborators.
    pub fn new(
        config: OverlayConfig,
        http: Arc<dyn HttpFetcher>,
        host: Arc<dyn OverlayHost>,
    ) -> Self {
        Self::build(config, http, host, None)
    }

    /// Create an overlay whose cache runs a release hook on every
    /// evicted or cleared bitmap, for hosts that track bitmap-backed
    /// resources themselves.
    pub fn with_release_hook(
        config: OverlayConfig,
        http: Arc<dyn HttpFetcher>,
        host: Arc<dyn OverlayHost>,
        hook: ReleaseHook,
    ) -> Self {
        Self::build(config, http, host, Some(hook))
    }

    fn build(
        config: OverlayConfig,
        http: Arc<dyn HttpFetcher>,
        host: Arc<dyn OverlayHost>,
        hook: Option<ReleaseHook>,
    ) -> Self {
        let cache = match hook {
            Some(hook) => BoundedTileCache::with_release_hook(config.cache_capacity, hook),
            None => BoundedTileCache::new(config.cache_capacity),
        };
        let cache = Arc::new(Mutex::new(cache));
        let tokens = Arc::new(SessionTokenManager::new(
            config.renewal_interval,
            config.retry_cooldown,
        ));
        let coordinator = Arc::new(TileFetchCoordinator::new(
            cache, tokens, http, host, &config,
        ));

        Self {
            renderer: ViewportRenderer::new(Arc::clone(&coordinator)),
            coordinator,
        }
    }

    /// Render one frame for the given viewport. Never blocks on I/O.
    pub fn draw(&self, canvas: &mut dyn TileCanvas, zoom: u8, origin: PixelPoint, size: PixelPoint) {
        self.renderer.draw(canvas, zoom, origin, size, Instant::now());
    }

    /// Render one frame with an explicit timestamp for token age checks.
    pub fn draw_at(
        &self,
        canvas: &mut dyn TileCanvas,
        zoom: u8,
        origin: PixelPoint,
        size: PixelPoint,
        now: Instant,
    ) {
        self.renderer.draw(canvas, zoom, origin, size, now);
    }

    /// Evict and release every cached tile. Called when the overlay is
    /// unloaded.
    pub fn clear(&self) {
        self.coordinator.clear();
    }
}
