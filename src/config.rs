//! Feed configuration parsed from environment variables.

use tracing::warn;

use crate::backoff::{BackoffPolicy, DEFAULT_FACTOR, DEFAULT_INITIAL_MS, DEFAULT_MAX_MS};
use crate::buffer;
use crate::client::FeedOptions;
use crate::endpoint::{DEFAULT_ROOM, Endpoint};
use crate::error::FeedError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_MESSAGE_LIMIT: i64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub base_url: String,
    pub room: String,
    /// Non-positive means unbounded.
    pub message_limit: i64,
    /// Opaque login session. Its presence is the logged-in flag.
    pub session_token: Option<String>,
    pub backoff: BackoffPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            room: DEFAULT_ROOM.to_owned(),
            message_limit: DEFAULT_MESSAGE_LIMIT,
            session_token: None,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl FeedConfig {
    /// Build config from environment variables, falling back to defaults for
    /// anything missing or unparseable.
    ///
    /// - `CHATFEED_BASE_URL`: default `http://127.0.0.1:3000`
    /// - `CHATFEED_ROOM`: default `global`
    /// - `CHATFEED_MESSAGE_LIMIT`: default 1000, `<= 0` for unbounded
    /// - `CHATFEED_SESSION_TOKEN`: unset means logged out
    /// - `CHATFEED_BACKOFF_INITIAL_MS` / `_FACTOR` / `_MAX_MS`: 1000 / 1.6 / 10000;
    ///   a zero initial delay, a factor below 1, or a cap below the initial
    ///   delay resets all three to the defaults
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env_string("CHATFEED_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let room = env_string("CHATFEED_ROOM").unwrap_or_else(|| DEFAULT_ROOM.to_owned());
        let parsed = BackoffPolicy {
            initial_ms: env_parse("CHATFEED_BACKOFF_INITIAL_MS", DEFAULT_INITIAL_MS),
            factor: env_parse("CHATFEED_BACKOFF_FACTOR", DEFAULT_FACTOR),
            max_ms: env_parse("CHATFEED_BACKOFF_MAX_MS", DEFAULT_MAX_MS),
        };
        let backoff = if parsed.is_valid() {
            parsed
        } else {
            warn!(?parsed, "config: backoff would not grow, using defaults");
            BackoffPolicy::default()
        };

        Self {
            base_url,
            room,
            message_limit: env_parse("CHATFEED_MESSAGE_LIMIT", DEFAULT_MESSAGE_LIMIT),
            session_token: env_string("CHATFEED_SESSION_TOKEN"),
            backoff,
        }
    }

    #[must_use]
    pub fn logged_in(&self) -> bool {
        self.session_token.is_some()
    }

    /// Validated endpoint for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidBaseUrl`] for non-`http(s)` bases.
    pub fn endpoint(&self) -> Result<Endpoint, FeedError> {
        Endpoint::parse(&self.base_url)
    }

    /// Options for constructing a feed client.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidBaseUrl`] for non-`http(s)` bases.
    pub fn feed_options(&self) -> Result<FeedOptions, FeedError> {
        Ok(FeedOptions {
            endpoint: self.endpoint()?,
            room: self.room.clone(),
            message_limit: buffer::capacity_from(self.message_limit),
            backoff: self.backoff,
        })
    }
}

/// The feed runs only when the feature is on and someone is logged in.
#[must_use]
pub fn feed_enabled(feature_enabled: bool, logged_in: bool) -> bool {
    feature_enabled && logged_in
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
