//! Server endpoint derivation.
//!
//! The feed lives at `<origin>/api/chat/ws?room=<room>` with the HTTP scheme
//! rewritten to its WebSocket counterpart. HTTP helper routes hang off the
//! same base.

use reqwest::Url;

use crate::error::FeedError;

pub const FEED_PATH: &str = "/api/chat/ws";
pub const FEED_SUBPROTOCOL: &str = "chat";
pub const DEFAULT_ROOM: &str = "global";

/// A validated `http(s)` base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Parse and validate a base URL such as `https://chat.example.com`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidBaseUrl`] unless the URL is absolute with an
    /// `http` or `https` scheme and a host.
    pub fn parse(raw: &str) -> Result<Self, FeedError> {
        let trimmed = raw.trim().trim_end_matches('/');
        let base = Url::parse(trimmed).map_err(|_| FeedError::InvalidBaseUrl(raw.to_owned()))?;
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(FeedError::InvalidBaseUrl(raw.to_owned()));
        }
        Ok(Self { base })
    }

    /// HTTP URL for an API route, e.g. `api_url("/api/status")`.
    #[must_use]
    pub fn api_url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(&join_path(self.base.path(), path));
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    /// WebSocket URL for the given room's feed.
    #[must_use]
    pub fn feed_url(&self, room: &str) -> Url {
        let mut url = self.api_url(FEED_PATH);
        let scheme = if self.base.scheme() == "https" { "wss" } else { "ws" };
        // Switching between special schemes never fails.
        let _ = url.set_scheme(scheme);
        url.query_pairs_mut().clear().append_pair("room", normalize_room(room));
        url
    }
}

/// Blank rooms fall back to [`DEFAULT_ROOM`].
#[must_use]
pub fn normalize_room(room: &str) -> &str {
    let trimmed = room.trim();
    if trimmed.is_empty() { DEFAULT_ROOM } else { trimmed }
}

fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{prefix}/{path}")
}

#[cfg(test)]
#[path = "endpoint_test.rs"]
mod tests;
