//! Overlay configuration.
//!
//! Groups the tunable parameters of the tile cache and fetch engine,
//! providing the historically observed defaults while allowing
//! customization per overlay instance. Tile size (256 pixels) and the
//! base-projection reference zoom (20) are protocol constants and live
//! in [`crate::coord`] instead.

use std::time::Duration;

/// Default number of tiles kept in the in-memory cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Default session token renewal interval.
pub const DEFAULT_RENEWAL_INTERVAL: Duration = Duration::from_secs(60);

/// Default cool-down after a failed token refresh before the next attempt.
pub const DEFAULT_RETRY_COOLDOWN: Duration = Duration::from_secs(5);

/// Default deadline for tile and token HTTP requests.
pub const DEFAULT_FETCH_DEADLINE: Duration = Duration::from_secs(30);

/// Default tile endpoint. Tile coordinates and the session token are
/// appended as `&x=..&y=..&z=..&tm=..` query parameters.
pub const DEFAULT_TILE_BASE_URL: &str = "http://trf.maps.yandex.net/tiles?l=trf";

/// Default token endpoint, returning a text payload containing a
/// `timestamp:"<token>"` field.
pub const DEFAULT_TOKEN_URL: &str = "http://trf.maps.yandex.net/trf/stat.js";

/// Configuration for a traffic overlay instance.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use trafficlayer::config::OverlayConfig;
///
/// // Using defaults
/// let config = OverlayConfig::default();
/// assert_eq!(config.cache_capacity, 20);
///
/// // Custom configuration
/// let config = OverlayConfig::new()
///     .with_cache_capacity(25)
///     .with_renewal_interval(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Maximum number of tiles kept in the cache before LRU eviction.
    pub cache_capacity: usize,
    /// How long a session token stays current before a refresh is issued.
    pub renewal_interval: Duration,
    /// Cool-down enforced after a failed token refresh.
    pub retry_cooldown: Duration,
    /// Deadline applied to every tile and token request.
    pub fetch_deadline: Duration,
    /// Tile endpoint; coordinates and token are appended as query parameters.
    pub tile_base_url: String,
    /// Token endpoint returning the `timestamp:"<token>"` payload.
    pub token_url: String,
}

impl OverlayConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tile cache capacity.
    ///
    /// Historical deployments used 20-25 entries. Default: 20.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the session token renewal interval. Default: 60 seconds.
    pub fn with_renewal_interval(mut self, interval: Duration) -> Self {
        self.renewal_interval = interval;
        self
    }

    /// Set the cool-down after a failed token refresh. Default: 5 seconds.
    pub fn with_retry_cooldown(mut self, cooldown: Duration) -> Self {
        self.retry_cooldown = cooldown;
        self
    }

    /// Set the HTTP deadline for tile and token requests. Default: 30 seconds.
    pub fn with_fetch_deadline(mut self, deadline: Duration) -> Self {
        self.fetch_deadline = deadline;
        self
    }

    /// Set the tile endpoint.
    pub fn with_tile_base_url(mut self, url: impl Into<String>) -> Self {
        self.tile_base_url = url.into();
        self
    }

    /// Set the token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            renewal_interval: DEFAULT_RENEWAL_INTERVAL,
            retry_cooldown: DEFAULT_RETRY_COOLDOWN,
            fetch_deadline: DEFAULT_FETCH_DEADLINE,
            tile_base_url: DEFAULT_TILE_BASE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}
