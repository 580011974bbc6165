//! Freshness of cached responses.
//!
//! Every stored response carries the time it was cached. Reads compare that
//! against the configured maximum age; an expired entry is a miss.

use chrono::Utc;
use outrider_core::{Response, Timestamp};
use std::time::Duration;

/// A response as held by a cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// The stored response.
    response: Response,
    /// When the response was written.
    cached_at: Timestamp,
}

impl CachedResponse {
    /// Wrap a response cached at the given time.
    pub fn new(response: Response, cached_at: Timestamp) -> Self {
        Self {
            response,
            cached_at,
        }
    }

    /// Wrap a response cached now.
    pub fn now(response: Response) -> Self {
        Self::new(response, Utc::now())
    }

    /// Consume the wrapper and return the response.
    pub fn into_response(self) -> Response {
        self.response
    }

    /// Get a reference to the response.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// When this response was cached.
    pub fn cached_at(&self) -> Timestamp {
        self.cached_at
    }

    /// Age of the entry at `now`. Entries cached in the future have age zero.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Age of the entry right now.
    pub fn staleness(&self) -> Duration {
        self.age_at(Utc::now())
    }

    /// Whether the entry is older than `max_age` at `now`.
    pub fn is_expired_at(&self, max_age: Duration, now: Timestamp) -> bool {
        self.age_at(now) > max_age
    }
}
