//! Integration tests for the traffic overlay engine.
//!
//! These tests drive the complete flow through the public facade:
//! - Session token acquisition gating the first frame
//! - Tile fetch scheduling, deduplication, and cache population
//! - Rendering of loaded tiles at the correct viewport offsets
//! - Token rotation and late-arriving responses
//!
//! Run with: `cargo test --test overlay_integration`

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::RgbaImage;

use trafficlayer::config::OverlayConfig;
use trafficlayer::coord::{PixelPoint, PixelRect};
use trafficlayer::fetch::{FetchCallback, FetchError, HttpFetcher};
use trafficlayer::host::OverlayHost;
use trafficlayer::overlay::TrafficOverlay;
use trafficlayer::render::TileCanvas;

// ============================================================================
// Mock Implementations
// ============================================================================

struct PendingFetch {
    url: String,
    on_done: FetchCallback,
}

/// Mock HTTP transport that parks requests until the test completes them.
#[derive(Default)]
struct MockHttp {
    pending: Mutex<VecDeque<PendingFetch>>,
    requested: Mutex<Vec<String>>,
}

impl MockHttp {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn requested_urls(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Complete the oldest pending request whose URL contains `fragment`.
    fn complete_matching(&self, fragment: &str, result: Result<Vec<u8>, FetchError>) -> String {
        let fetch = {
            let mut pending = self.pending.lock().unwrap();
            let at = pending
                .iter()
                .position(|f| f.url.contains(fragment))
                .unwrap_or_else(|| panic!("no pending request matching {fragment}"));
            pending.remove(at).unwrap()
        };
        (fetch.on_done)(result);
        fetch.url
    }
}

impl HttpFetcher for MockHttp {
    fn fetch(&self, url: &str, _deadline: Duration, on_done: FetchCallback) {
        self.requested.lock().unwrap().push(url.to_string());
        self.pending.lock().unwrap().push_back(PendingFetch {
            url: url.to_string(),
            on_done,
        });
    }
}

/// Host that records redraw notifications.
#[derive(Default)]
struct RecordingHost {
    invalidations: AtomicUsize,
    updates: Mutex<Vec<(PixelRect, u8)>>,
}

impl RecordingHost {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl OverlayHost for RecordingHost {
    fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    fn on_update(&self, rect: PixelRect, zoom: u8) {
        self.updates.lock().unwrap().push((rect, zoom));
    }
}

/// Canvas that records bitmap placements.
#[derive(Default)]
struct RecordingCanvas {
    draws: Vec<(i32, i32)>,
}

impl TileCanvas for RecordingCanvas {
    fn draw_bitmap(&mut self, _bitmap: &RgbaImage, left: i32, top: i32) {
        self.draws.push((left, top));
    }
}

fn png_bytes() -> Vec<u8> {
    let img = RgbaImage::from_pixel(8, 8, image::Rgba([200, 40, 40, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

// ============================================================================
// Test Fixture
// ============================================================================

const ZOOM: u8 = 4;
/// Viewport centered on the world center, where base and provider pixel
/// positions coincide: tiles 7..9 x 7..9 are visible and tile (7,7)
/// lands at the viewport origin.
const ORIGIN: PixelPoint = PixelPoint { x: 1792, y: 1792 };
const SIZE: PixelPoint = PixelPoint { x: 512, y: 512 };

struct Fixture {
    overlay: TrafficOverlay,
    http: Arc<MockHttp>,
    host: Arc<RecordingHost>,
    epoch: Instant,
}

fn fixture() -> Fixture {
    let config = OverlayConfig::default()
        .with_tile_base_url("http://tiles.test/traffic?l=trf")
        .with_token_url("http://tiles.test/stat.js");
    let http = MockHttp::new();
    let host = RecordingHost::new();
    let overlay = TrafficOverlay::new(
        config,
        Arc::clone(&http) as Arc<dyn HttpFetcher>,
        Arc::clone(&host) as Arc<dyn OverlayHost>,
    );
    Fixture {
        overlay,
        http,
        host,
        epoch: Instant::now(),
    }
}

impl Fixture {
    fn draw(&self, canvas: &mut RecordingCanvas, at: Instant) {
        self.overlay.draw_at(canvas, ZOOM, ORIGIN, SIZE, at);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_end_to_end_token_then_tiles_then_draw() {
    let fx = fixture();
    let mut canvas = RecordingCanvas::default();

    // Frame 1: no token yet. Nothing drawn, exactly one token request.
    fx.draw(&mut canvas, fx.epoch);
    assert!(canvas.draws.is_empty());
    assert_eq!(fx.http.requested_urls(), vec!["http://tiles.test/stat.js"]);

    // Token arrives; host is told to schedule a redraw.
    fx.http
        .complete_matching("stat.js", Ok(br#"info:{timestamp:"42",ttl:600}"#.to_vec()));
    assert_eq!(fx.host.invalidations(), 1);

    // Frame 2: tile fetches go out for the 2x2 visible range, all under
    // the new token. Nothing is loaded yet, so nothing is drawn.
    fx.draw(&mut canvas, fx.epoch + Duration::from_millis(16));
    assert!(canvas.draws.is_empty());
    assert_eq!(fx.http.pending_count(), 4);
    let urls = fx.http.requested_urls();
    assert!(urls[1..].iter().all(|u| u.contains("z=4") && u.ends_with("tm=42")));

    // One tile lands; the host gets a region update for it.
    fx.http.complete_matching("&x=7&y=7&", Ok(png_bytes()));
    assert_eq!(fx.host.update_count(), 1);

    // Frame 3: the loaded tile is drawn at the viewport origin.
    fx.draw(&mut canvas, fx.epoch + Duration::from_millis(32));
    assert_eq!(canvas.draws, vec![(0, 0)]);

    // Remaining tiles land and the full range renders.
    fx.http.complete_matching("&x=8&y=7&", Ok(png_bytes()));
    fx.http.complete_matching("&x=7&y=8&", Ok(png_bytes()));
    fx.http.complete_matching("&x=8&y=8&", Ok(png_bytes()));

    canvas.draws.clear();
    fx.draw(&mut canvas, fx.epoch + Duration::from_millis(48));
    let mut draws = canvas.draws.clone();
    draws.sort_unstable();
    assert_eq!(draws, vec![(0, 0), (0, 256), (256, 0), (256, 256)]);
}

#[test]
fn test_concurrent_draws_fetch_each_tile_once() {
    let fx = fixture();

    // Acquire a token first.
    let mut canvas = RecordingCanvas::default();
    fx.draw(&mut canvas, fx.epoch);
    fx.http
        .complete_matching("stat.js", Ok(br#"timestamp:"42""#.to_vec()));

    let at = fx.epoch + Duration::from_millis(16);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut canvas = RecordingCanvas::default();
                fx.draw(&mut canvas, at);
            });
        }
    });

    // Four visible tiles, four requests, regardless of how many frames
    // raced over the same range.
    let tile_urls: Vec<String> = fx
        .http
        .requested_urls()
        .into_iter()
        .filter(|u| u.contains("tm=42") && !u.contains("stat.js"))
        .collect();
    assert_eq!(tile_urls.len(), 4);
}

#[test]
fn test_token_rotation_refetches_under_new_token() {
    let fx = fixture();
    let mut canvas = RecordingCanvas::default();

    fx.draw(&mut canvas, fx.epoch);
    fx.http
        .complete_matching("stat.js", Ok(br#"timestamp:"42""#.to_vec()));
    fx.draw(&mut canvas, fx.epoch + Duration::from_millis(16));
    for fragment in ["&x=7&y=7&", "&x=8&y=7&", "&x=7&y=8&", "&x=8&y=8&"] {
        fx.http.complete_matching(fragment, Ok(png_bytes()));
    }

    // Past the renewal interval the next frame triggers one refresh and
    // skips drawing while it is in flight.
    canvas.draws.clear();
    let later = fx.epoch + Duration::from_secs(61);
    fx.draw(&mut canvas, later);
    assert!(canvas.draws.is_empty());
    assert_eq!(fx.http.pending_count(), 1);

    fx.http
        .complete_matching("stat.js", Ok(br#"timestamp:"43""#.to_vec()));
    assert_eq!(fx.host.invalidations(), 2);

    // The next frame fetches the whole range again under the new token.
    fx.draw(&mut canvas, later + Duration::from_millis(16));
    let urls = fx.http.requested_urls();
    let fresh: Vec<&String> = urls.iter().filter(|u| u.ends_with("tm=43")).collect();
    assert_eq!(fresh.len(), 4);

    // A tile under the rotated token renders once it lands.
    fx.http.complete_matching("tm=43", Ok(png_bytes()));
    canvas.draws.clear();
    fx.draw(&mut canvas, later + Duration::from_millis(32));
    assert_eq!(canvas.draws.len(), 1);
}

#[test]
fn test_failed_token_fetch_backs_off_then_recovers() {
    let fx = fixture();
    let mut canvas = RecordingCanvas::default();

    fx.draw(&mut canvas, fx.epoch);
    fx.http.complete_matching(
        "stat.js",
        Err(FetchError::Network("connection refused".into())),
    );
    assert_eq!(fx.host.invalidations(), 0);

    // Inside the cool-down: no new attempt, still nothing drawn.
    fx.draw(&mut canvas, fx.epoch + Duration::from_secs(1));
    assert_eq!(fx.http.requested_urls().len(), 1);
    assert!(canvas.draws.is_empty());

    // After the cool-down the refresh is retried and succeeds.
    fx.draw(&mut canvas, fx.epoch + Duration::from_secs(6));
    assert_eq!(fx.http.requested_urls().len(), 2);
    fx.http
        .complete_matching("stat.js", Ok(br#"timestamp:"7""#.to_vec()));

    fx.draw(&mut canvas, fx.epoch + Duration::from_secs(7));
    assert_eq!(fx.http.pending_count(), 4);
}

#[test]
fn test_unparseable_token_payload_is_a_failure() {
    let fx = fixture();
    let mut canvas = RecordingCanvas::default();

    fx.draw(&mut canvas, fx.epoch);
    fx.http
        .complete_matching("stat.js", Ok(b"<html>moved</html>".to_vec()));
    assert_eq!(fx.host.invalidations(), 0);

    // Treated like a network failure: cool-down, then retry.
    fx.draw(&mut canvas, fx.epoch + Duration::from_secs(6));
    assert_eq!(fx.http.requested_urls().len(), 2);
}

#[test]
fn test_late_response_under_old_token_is_kept_but_not_drawn() {
    let fx = fixture();
    let mut canvas = RecordingCanvas::default();

    fx.draw(&mut canvas, fx.epoch);
    fx.http
        .complete_matching("stat.js", Ok(br#"timestamp:"42""#.to_vec()));
    fx.draw(&mut canvas, fx.epoch + Duration::from_millis(16));
    assert_eq!(fx.http.pending_count(), 4);

    // Rotate the token while the old fetches are still in flight.
    let later = fx.epoch + Duration::from_secs(61);
    fx.draw(&mut canvas, later);
    fx.http
        .complete_matching("stat.js", Ok(br#"timestamp:"43""#.to_vec()));
    fx.draw(&mut canvas, later + Duration::from_millis(16));

    // An old-token response arrives late. It is stored under its own
    // key and announced, but frames under the new token ignore it.
    fx.http.complete_matching("tm=42", Ok(png_bytes()));
    assert_eq!(fx.host.update_count(), 1);

    canvas.draws.clear();
    fx.draw(&mut canvas, later + Duration::from_millis(32));
    assert!(canvas.draws.is_empty());
}

#[test]
fn test_clear_then_redraw_refetches() {
    let fx = fixture();
    let mut canvas = RecordingCanvas::default();

    fx.draw(&mut canvas, fx.epoch);
    fx.http
        .complete_matching("stat.js", Ok(br#"timestamp:"42""#.to_vec()));
    fx.draw(&mut canvas, fx.epoch + Duration::from_millis(16));
    fx.http.complete_matching("&x=7&y=7&", Ok(png_bytes()));

    fx.overlay.clear();

    // The cleared range is fetched again on the next frame.
    fx.draw(&mut canvas, fx.epoch + Duration::from_millis(32));
    let urls = fx.http.requested_urls();
    let tile_requests = urls.iter().filter(|u| u.contains("tm=42")).count();
    assert_eq!(tile_requests, 8);
}
