//! Session token state machine.
//!
//! The tile provider gates tile validity on an opaque session token (the
//! `tm` query parameter) served by a separate endpoint. The manager keeps
//! the current token, its age, and at most one in-flight refresh:
//!
//! ```text
//! Unset -> Loading -> Valid(value, acquired_at) -> (age > renewal) -> Loading -> ...
//!            |
//!            +-- failure --> Unset (+ retry cool-down)
//! ```
//!
//! A failed refresh does not fall back to the previous value; the state
//! returns to `Unset` with the failure time recorded, so retries wait out
//! a short cool-down instead of storming a failing endpoint.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Token acquisition and parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The token endpoint request failed (transport error or timeout).
    #[error("token endpoint request failed: {0}")]
    Endpoint(String),
    /// The payload does not contain the `timestamp:` marker.
    #[error("token payload missing timestamp marker")]
    MissingMarker,
    /// No quoted value follows the marker, or the value is empty.
    #[error("token payload missing quoted value after timestamp marker")]
    MissingValue,
}

/// Result of a token check on the render path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCheck {
    /// A current token; safe to fetch tiles under it.
    Current(String),
    /// This call moved the state to `Loading`: the caller must issue
    /// exactly one refresh request and feed the outcome to
    /// [`SessionTokenManager::on_refresh_result`].
    RefreshTriggered,
    /// A refresh is already in flight, or a failure cool-down is active.
    /// Callers skip fetching until resolved.
    Pending,
}

#[derive(Debug)]
enum TokenState {
    Unset,
    Loading,
    Valid { value: String, acquired_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: TokenState,
    /// Set when a refresh fails; gates the retry cool-down.
    last_failure: Option<Instant>,
}

/// Tracks the current session token and serializes refreshes.
///
/// All state lives behind one internal mutex, so concurrent render calls
/// observe a consistent state and at most one of them is told to trigger
/// a refresh.
pub struct SessionTokenManager {
    inner: Mutex<Inner>,
    renewal_interval: Duration,
    retry_cooldown: Duration,
}

impl SessionTokenManager {
    /// Create a manager in the `Unset` state.
    pub fn new(renewal_interval: Duration, retry_cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: TokenState::Unset,
                last_failure: None,
            }),
            renewal_interval,
            retry_cooldown,
        }
    }

    /// Check the token, atomically starting a refresh if it is absent or
    /// older than the renewal interval.
    ///
    /// Exactly one caller observes [`TokenCheck::RefreshTriggered`] per
    /// refresh cycle; that caller owns issuing the network request.
    pub fn check_and_maybe_refresh(&self, now: Instant) -> TokenCheck {
        let mut inner = self.inner.lock().unwrap();
        match &inner.state {
            TokenState::Loading => TokenCheck::Pending,
            TokenState::Valid { value, acquired_at } => {
                if now.saturating_duration_since(*acquired_at) <= self.renewal_interval {
                    TokenCheck::Current(value.clone())
                } else {
                    inner.state = TokenState::Loading;
                    TokenCheck::RefreshTriggered
                }
            }
            TokenState::Unset => {
                if let Some(failed_at) = inner.last_failure {
                    if now.saturating_duration_since(failed_at) < self.retry_cooldown {
                        return TokenCheck::Pending;
                    }
                }
                inner.state = TokenState::Loading;
                TokenCheck::RefreshTriggered
            }
        }
    }

    /// Record the outcome of the refresh request triggered by
    /// [`check_and_maybe_refresh`](Self::check_and_maybe_refresh).
    pub fn on_refresh_result(&self, result: Result<String, TokenError>, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(
            matches!(inner.state, TokenState::Loading),
            "refresh result without an in-flight refresh"
        );
        match result {
            Ok(value) => {
                debug!(token = %value, "session token refreshed");
                inner.state = TokenState::Valid {
                    value,
                    acquired_at: now,
                };
                inner.last_failure = None;
            }
            Err(error) => {
                warn!(%error, "session token refresh failed");
                inner.state = TokenState::Unset;
                inner.last_failure = Some(now);
            }
        }
    }

    /// The current token value, if the state is `Valid`.
    pub fn current(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        match &inner.state {
            TokenState::Valid { value, .. } => Some(value.clone()),
            _ => None,
        }
    }
}

/// Extract the session token from a token endpoint payload.
///
/// The token is the substring between the first pair of double quotes
/// following the literal marker `timestamp:`. A missing marker, missing
/// quotes, or an empty value is a parse failure, which callers treat the
/// same as a network failure.
pub fn parse_token_payload(payload: &str) -> Result<String, TokenError> {
    let after_marker = payload
        .find("timestamp:")
        .map(|at| &payload[at + "timestamp:".len()..])
        .ok_or(TokenError::MissingMarker)?;

    let open = after_marker.find('"').ok_or(TokenError::MissingValue)?;
    let rest = &after_marker[open + 1..];
    let close = rest.find('"').ok_or(TokenError::MissingValue)?;

    let token = &rest[..close];
    if token.is_empty() {
        return Err(TokenError::MissingValue);
    }
    Ok(token.to_string())
}
