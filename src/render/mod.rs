//! Viewport rendering.
//!
//! Computes the visible tile range for a viewport and draws whatever
//! tiles are currently cached. Drawing is strictly best-effort: a frame
//! with no token or no tiles simply draws nothing, and missing tiles
//! appear on a later frame once their fetches complete.

use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;

use crate::cache::TileKey;
use crate::coord::{base_to_geo, geo_to_native, PixelPoint, TileRange, TILE_SIZE};
use crate::fetch::TileFetchCoordinator;

/// Drawing surface collaborator.
///
/// Rasterization stays with the host; the renderer only positions
/// bitmaps. `left`/`top` are pixels relative to the viewport origin.
pub trait TileCanvas {
    fn draw_bitmap(&mut self, bitmap: &RgbaImage, left: i32, top: i32);
}

/// Compute the tile rectangle covering a viewport, clamped to the world.
///
/// Left and top bounds floor-divide by the tile size; right and bottom
/// bounds round up, so partially visible edge tiles are included and the
/// resulting range is the smallest one fully covering the viewport.
///
/// # Arguments
///
/// * `native_origin` - Viewport top-left in provider-projection pixels
/// * `size` - Viewport size in pixels
/// * `zoom` - Zoom level, bounding the world to 2^zoom tiles per axis
pub fn visible_tile_range(native_origin: PixelPoint, size: PixelPoint, zoom: u8) -> TileRange {
    let left = native_origin.x.div_euclid(TILE_SIZE);
    let top = native_origin.y.div_euclid(TILE_SIZE);
    let right = (native_origin.x + size.x + TILE_SIZE - 1).div_euclid(TILE_SIZE);
    let bottom = (native_origin.y + size.y + TILE_SIZE - 1).div_euclid(TILE_SIZE);

    let world = 1i64 << zoom;
    let clamp = |v: i32| -> i32 { (v as i64).clamp(0, world) as i32 };

    let left = clamp(left);
    let top = clamp(top);
    TileRange {
        left,
        top,
        right: clamp(right).max(left),
        bottom: clamp(bottom).max(top),
    }
}

/// Draws the traffic overlay for the current viewport.
pub struct ViewportRenderer {
    coordinator: Arc<TileFetchCoordinator>,
}

impl ViewportRenderer {
    pub fn new(coordinator: Arc<TileFetchCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Render one frame.
    ///
    /// Resolves the session token (skipping the frame silently while none
    /// is usable), maps the viewport center into the provider projection,
    /// schedules fetches for missing tiles in the visible range, and
    /// draws every tile that is already loaded at its offset relative to
    /// the viewport origin. Never blocks on I/O.
    ///
    /// # Arguments
    ///
    /// * `canvas` - Drawing surface
    /// * `zoom` - Current zoom level
    /// * `origin` - Viewport top-left in base-projection pixels at `zoom`
    /// * `size` - Viewport size in pixels
    /// * `now` - Frame timestamp, used for token age checks
    pub fn draw(
        &self,
        canvas: &mut dyn TileCanvas,
        zoom: u8,
        origin: PixelPoint,
        size: PixelPoint,
        now: Instant,
    ) {
        let Some(token) = self.coordinator.resolve_token(now) else {
            return;
        };
        if token.is_empty() {
            return;
        }

        // The two projections only agree after a round trip through
        // geographic coordinates at the viewport center.
        let Ok(center) = base_to_geo(origin.x + size.x / 2, origin.y + size.y / 2, zoom) else {
            return;
        };
        let Ok(native_center) = geo_to_native(center.lat, center.lng, zoom) else {
            return;
        };
        let native_origin = PixelPoint::new(
            native_center.x - size.x / 2,
            native_center.y - size.y / 2,
        );

        let range = visible_tile_range(native_origin, size, zoom);
        self.coordinator.ensure_tiles(&range, zoom, &token);

        for ty in range.top..range.bottom {
            for tx in range.left..range.right {
                let key = TileKey::new(tx as u32, ty as u32, zoom, token.clone());
                if let Some(bitmap) = self.coordinator.lookup(&key) {
                    canvas.draw_bitmap(
                        &bitmap,
                        tx * TILE_SIZE - native_origin.x,
                        ty * TILE_SIZE - native_origin.y,
                    );
                }
            }
        }
    }
}
