//! Host application collaborator contract.

use crate::coord::PixelRect;

/// Redraw notifications consumed by the host application.
///
/// The engine never draws outside of [`draw`](crate::render::ViewportRenderer::draw)
/// calls; when something changes off-frame (a tile arrived, the session
/// token rotated) it asks the host to schedule a redraw through this
/// trait. Implementations must be cheap and non-blocking, since they are
/// invoked from network callback threads.
pub trait OverlayHost: Send + Sync {
    /// Something changed; redraw the overlay eventually.
    fn invalidate(&self);

    /// A specific region has new content.
    ///
    /// # Arguments
    ///
    /// * `rect` - Region in base-projection pixels at the reference zoom
    /// * `zoom` - Zoom level the content belongs to
    fn on_update(&self, rect: PixelRect, zoom: u8);
}
