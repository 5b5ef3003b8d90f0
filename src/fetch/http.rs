//! HTTP transport abstraction for testability.
//!
//! The engine never performs network I/O itself; it hands URLs and
//! completion callbacks to an [`HttpFetcher`]. This seam keeps the render
//! path free of blocking calls and lets tests drive completion ordering
//! by hand.

use std::time::Duration;

use thiserror::Error;
use tracing::trace;

/// Transport-level fetch errors.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Request failed (connection error, non-success status, read error).
    #[error("request failed: {0}")]
    Network(String),
    /// The deadline elapsed before the response completed.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Completion callback for a fetch. Invoked exactly once, off the
/// caller's thread, with the payload bytes or a typed failure.
pub type FetchCallback = Box<dyn FnOnce(Result<Vec<u8>, FetchError>) + Send + 'static>;

/// Asynchronous HTTP GET with a bounded deadline.
///
/// Implementations must not run the request on the caller's thread: the
/// render path calls [`fetch`](HttpFetcher::fetch) and needs it to return
/// immediately.
pub trait HttpFetcher: Send + Sync {
    /// Start a GET request for `url` and deliver the outcome to `on_done`
    /// exactly once. A timeout surfaces as [`FetchError::Timeout`].
    fn fetch(&self, url: &str, deadline: Duration, on_done: FetchCallback);
}

/// Browser-like User-Agent; some tile servers reject requests without one.
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Real HTTP fetcher built on a blocking reqwest client.
///
/// Each fetch runs on a short-lived worker thread with a per-request
/// timeout, so the calling thread is never blocked on I/O.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher with default configuration.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn get(
        client: &reqwest::blocking::Client,
        url: &str,
        deadline: Duration,
    ) -> Result<Vec<u8>, FetchError> {
        let response = client.get(url).timeout(deadline).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(deadline)
            } else {
                FetchError::Network(format!("request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            return Err(FetchError::Network(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Network(format!("failed to read response: {}", e)))
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn fetch(&self, url: &str, deadline: Duration, on_done: FetchCallback) {
        trace!(url = url, "HTTP GET starting");
        let client = self.client.clone();
        let url = url.to_string();
        std::thread::spawn(move || {
            on_done(Self::get(&client, &url, deadline));
        });
    }
}
