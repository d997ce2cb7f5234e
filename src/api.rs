//! HTTP calls to the chat server's REST surface.
//!
//! The feed itself is WebSocket-only; these helpers cover what a display
//! layer needs around it: whether the chat room is on and how big its window
//! is, the unread badge count, and image upload for attachments.
//!
//! ERROR HANDLING
//! ==============
//! Every endpoint answers with `{success, message, data}`. `success: false`
//! becomes [`FeedError::Api`] carrying the server's message, whatever the
//! HTTP status. Non-JSON error bodies fall back to the status line.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::compose::DEFAULT_MAX_MESSAGE_LENGTH;
use crate::config::DEFAULT_MESSAGE_LIMIT;
use crate::endpoint::{self, Endpoint};
use crate::error::FeedError;
use crate::runtime::SESSION_COOKIE;

/// Largest image the server accepts.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusData {
    chat_room_enabled: Option<bool>,
    chat_room_message_limit: Option<i64>,
    chat_room_max_message_length: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CountData {
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

/// Chat-room settings published by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatRoomStatus {
    pub enabled: bool,
    pub message_limit: i64,
    pub max_message_length: usize,
}

impl Default for ChatRoomStatus {
    fn default() -> Self {
        StatusData::default().into()
    }
}

impl From<StatusData> for ChatRoomStatus {
    fn from(data: StatusData) -> Self {
        let max_message_length = data
            .chat_room_max_message_length
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_MESSAGE_LENGTH);
        Self {
            // Only an explicit `false` turns the room off.
            enabled: data.chat_room_enabled != Some(false),
            message_limit: data.chat_room_message_limit.filter(|n| *n > 0).unwrap_or(DEFAULT_MESSAGE_LIMIT),
            max_message_length,
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct ApiClient {
    http: reqwest::Client,
    endpoint: Endpoint,
}

impl ApiClient {
    /// Build a client that sends the session cookie (when given) on every call.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(endpoint: Endpoint, session_token: Option<&str>) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = session_token {
            headers.insert(COOKIE, HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}"))?);
        }
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, endpoint })
    }

    /// `GET /api/status`, reduced to the chat-room fields.
    ///
    /// # Errors
    ///
    /// HTTP, decode, or API failure.
    pub async fn status(&self) -> Result<ChatRoomStatus, FeedError> {
        let url = self.endpoint.api_url("/api/status");
        let data: StatusData = decode(self.http.get(url).send().await?).await?;
        Ok(data.into())
    }

    /// `GET /api/chat/count?room=<room>`.
    ///
    /// # Errors
    ///
    /// HTTP, decode, or API failure.
    pub async fn message_count(&self, room: &str) -> Result<u64, FeedError> {
        let mut url = self.endpoint.api_url("/api/chat/count");
        url.query_pairs_mut().append_pair("room", endpoint::normalize_room(room));
        let data: CountData = decode(self.http.get(url).send().await?).await?;
        Ok(data.count)
    }

    /// Upload image bytes and return the URL to attach to a message.
    ///
    /// # Errors
    ///
    /// [`FeedError::InvalidImage`] before any request when the content type is
    /// not `image/*` or the payload exceeds [`MAX_IMAGE_BYTES`]; otherwise
    /// HTTP, decode, or API failure.
    pub async fn upload_image(&self, file_name: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, FeedError> {
        validate_image(content_type, bytes.len())?;
        let part = Part::bytes(bytes).file_name(file_name.to_owned()).mime_str(content_type)?;
        let form = Form::new().part("file", part);
        let url = self.endpoint.api_url("/api/chat/images");
        debug!(%url, file_name, "api: uploading image");
        let data: UploadData = decode(self.http.post(url).multipart(form).send().await?).await?;
        Ok(data.url)
    }

    /// Read a local file and upload it, inferring the content type from its
    /// extension.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::upload_image`]; also I/O errors reading the file.
    pub async fn upload_image_file(&self, path: &Path) -> Result<String, FeedError> {
        let content_type = image_content_type(path)
            .ok_or_else(|| FeedError::InvalidImage(format!("{} is not an image", path.display())))?;
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.len() > MAX_IMAGE_BYTES as u64 {
            return Err(FeedError::InvalidImage(format!("{} exceeds 10 MiB", path.display())));
        }
        let bytes = tokio::fs::read(path).await?;
        let file_name = path.file_name().map_or_else(|| "image".to_owned(), |n| n.to_string_lossy().into_owned());
        self.upload_image(&file_name, content_type, bytes).await
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, FeedError> {
    let status = response.status();
    let body = response.bytes().await?;
    match serde_json::from_slice::<Envelope<T>>(&body) {
        Ok(envelope) if envelope.success => {
            envelope.data.ok_or_else(|| FeedError::Api("response missing data".to_owned()))
        }
        Ok(envelope) if envelope.message.is_empty() => Err(FeedError::Api(status.to_string())),
        Ok(envelope) => Err(FeedError::Api(envelope.message)),
        Err(e) if status.is_success() => Err(e.into()),
        Err(_) => Err(FeedError::Api(status.to_string())),
    }
}

/// Client-side checks mirrored from the server's upload limits.
///
/// # Errors
///
/// [`FeedError::InvalidImage`] for non-image types or oversized payloads.
pub fn validate_image(content_type: &str, len: usize) -> Result<(), FeedError> {
    if !content_type.starts_with("image/") {
        return Err(FeedError::InvalidImage(format!("unsupported content type {content_type}")));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(FeedError::InvalidImage(format!("{len} bytes exceeds 10 MiB")));
    }
    Ok(())
}

/// Content type for common image extensions, `None` for anything else.
#[must_use]
pub fn image_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
