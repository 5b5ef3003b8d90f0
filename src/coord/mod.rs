//! Coordinate conversion module.
//!
//! Converts between the host map's base projection (spherical Mercator
//! pixels) and the traffic tile provider's own ellipsoidal Mercator
//! projection at a given zoom level. The two projections agree on
//! longitude but diverge in latitude, so a viewport position must be
//! routed through geographic coordinates before tile indices can be
//! computed.
//!
//! All conversions are pure functions and safe to call from any thread.

mod types;

pub use types::{
    CoordError, GeoPoint, PixelPoint, PixelRect, TileRange, CONVERGENCE_EPS, MAX_LAT_ITERATIONS,
    MAX_ZOOM, REFERENCE_ZOOM, SEMI_MAJOR_AXIS, SEMI_MINOR_AXIS, TILE_SIZE,
};

use std::f64::consts::{FRAC_PI_2, PI};

/// First eccentricity of the reference ellipsoid.
#[inline]
fn eccentricity() -> f64 {
    (SEMI_MAJOR_AXIS * SEMI_MAJOR_AXIS - SEMI_MINOR_AXIS * SEMI_MINOR_AXIS).sqrt()
        / SEMI_MAJOR_AXIS
}

/// World edge length in pixels at the given zoom.
#[inline]
fn world_pixels(zoom: u8) -> f64 {
    (1u32 << zoom) as f64 * TILE_SIZE as f64
}

#[inline]
fn check_zoom(zoom: u8) -> Result<(), CoordError> {
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }
    Ok(())
}

/// Converts a pixel position in the provider's ellipsoidal projection to
/// geographic coordinates.
///
/// The longitude is closed-form; the latitude has no closed-form inverse
/// on an ellipsoid and is solved by fixed-point iteration from a
/// spherical seed, until successive iterates differ by less than
/// [`CONVERGENCE_EPS`] or [`MAX_LAT_ITERATIONS`] is reached. The asin
/// argument is clamped to [-1, 1] against numerical drift near the poles.
///
/// # Arguments
///
/// * `x`, `y` - Pixel position in the provider projection at `zoom`
/// * `zoom` - Zoom level (0 to 20)
pub fn native_to_geo(x: i32, y: i32, zoom: u8) -> Result<GeoPoint, CoordError> {
    check_zoom(zoom)?;

    let world = world_pixels(zoom);
    let px = x as f64 / world;
    let py = y as f64 / world;

    let lng = 360.0 * (px - 0.5);

    let dy = -2.0 * PI * (py - 0.5);
    let e = eccentricity();

    // Spherical latitude as the seed for the ellipsoidal solve.
    let mut lat = 2.0 * dy.exp().atan() - FRAC_PI_2;
    let mut prev = -100.0;
    let mut iterations = 0;

    while (prev - lat).abs() >= CONVERGENCE_EPS && iterations < MAX_LAT_ITERATIONS {
        prev = lat;
        let s = prev.sin();
        let arg = 1.0
            - ((1.0 + s) * (1.0 - e * s).powf(e)) / ((2.0 * dy).exp() * (1.0 + e * s).powf(e));
        lat = arg.clamp(-1.0, 1.0).asin();
        iterations += 1;
    }

    Ok(GeoPoint {
        lat: lat.to_degrees(),
        lng,
    })
}

/// Converts geographic coordinates to a pixel position in the provider's
/// ellipsoidal projection.
///
/// Closed-form forward Mercator on the reference ellipsoid.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees
/// * `lng` - Longitude in degrees
/// * `zoom` - Zoom level (0 to 20)
pub fn geo_to_native(lat: f64, lng: f64, zoom: u8) -> Result<PixelPoint, CoordError> {
    check_zoom(zoom)?;

    let lat_rad = lat.to_radians();
    let s = lat_rad.sin();
    let e = eccentricity();

    let lat_merc = ((1.0 + s) / (1.0 - s)).ln() / 2.0
        - e * ((1.0 + e * s) / (1.0 - e * s)).ln() / 2.0;
    let py = 0.5 - lat_merc / (2.0 * PI);

    let world = world_pixels(zoom);
    Ok(PixelPoint {
        x: ((lng + 180.0) / 360.0 * world) as i32,
        y: (world * py) as i32,
    })
}

/// Converts a pixel position in the host's base projection (spherical
/// Mercator) to geographic coordinates.
///
/// # Arguments
///
/// * `x`, `y` - Pixel position in the base projection at `zoom`
/// * `zoom` - Zoom level (0 to 20)
pub fn base_to_geo(x: i32, y: i32, zoom: u8) -> Result<GeoPoint, CoordError> {
    check_zoom(zoom)?;

    let world = world_pixels(zoom);
    let lng = 360.0 * (x as f64 / world - 0.5);
    let lat = (PI * (1.0 - 2.0 * y as f64 / world)).sinh().atan().to_degrees();

    Ok(GeoPoint { lat, lng })
}

/// Translates a native tile index to the base-projection rectangle it
/// covers at [`REFERENCE_ZOOM`].
///
/// The host addresses redraw regions in pixels at the fixed reference
/// zoom, so a tile at zoom `z` scales by the bit shift `20 - z`.
///
/// # Arguments
///
/// * `tile_x`, `tile_y` - Tile indices in [0, 2^zoom)
/// * `zoom` - Zoom level (0 to 20)
pub fn tile_to_base_rect(tile_x: u32, tile_y: u32, zoom: u8) -> Result<PixelRect, CoordError> {
    check_zoom(zoom)?;
    debug_assert!(tile_x < (1u32 << zoom) && tile_y < (1u32 << zoom));

    let shift = (REFERENCE_ZOOM - zoom) as u32;
    let size = (TILE_SIZE as i64) << shift;
    let left = tile_x as i64 * size;
    let top = tile_y as i64 * size;

    Ok(PixelRect {
        left: left as i32,
        top: top as i32,
        right: (left + size) as i32,
        bottom: (top + size) as i32,
    })
}
