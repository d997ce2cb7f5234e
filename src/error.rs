//! Error types shared by the feed client, HTTP helpers, and CLI.

/// Errors surfaced by the library.
///
/// Transport-level failures never appear here: those are absorbed by the
/// feed client and exposed as its last-error string.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The base URL is not an absolute `http://` or `https://` URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    /// An HTTP request to the server failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// An HTTP header value could not be constructed.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    /// The server answered with `success: false`.
    #[error("server rejected request: {0}")]
    Api(String),
    /// An image failed the client-side upload checks.
    #[error("invalid image: {0}")]
    InvalidImage(String),
    /// Reading a local file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A JSON payload could not be encoded or decoded.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    /// No expected event arrived before the deadline.
    #[error("timed out waiting for feed")]
    Timeout,
    /// The feed service task has exited.
    #[error("feed service stopped")]
    ServiceStopped,
}
