//! TrafficLayer - traffic tile overlay engine for tiled map views
//!
//! This library renders a traffic overlay on top of a tiled map: for a
//! visible viewport it determines which remote traffic tiles are needed,
//! serves cached tiles immediately, and fetches missing ones asynchronously
//! without ever blocking the render path.
//!
//! # High-Level API
//!
//! Host applications construct a [`overlay::TrafficOverlay`] with their HTTP
//! transport and UI collaborators, then drive it once per frame:
//!
//! ```ignore
//! use std::sync::Arc;
//! use trafficlayer::config::OverlayConfig;
//! use trafficlayer::fetch::ReqwestFetcher;
//! use trafficlayer::overlay::TrafficOverlay;
//!
//! let http = Arc::new(ReqwestFetcher::new()?);
//! let overlay = TrafficOverlay::new(OverlayConfig::default(), http, host);
//!
//! // On the render thread, once per frame:
//! overlay.draw(&mut canvas, zoom, origin, size);
//! ```
//!
//! The overlay never draws a tile it does not have: missing tiles are
//! skipped silently this frame and appear on a later frame once their
//! fetch completes and the host is asked to redraw.

pub mod cache;
pub mod config;
pub mod coord;
pub mod fetch;
pub mod host;
pub mod logging;
pub mod overlay;
pub mod registry;
pub mod render;
pub mod token;

/// Version of the TrafficLayer library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
