//! Wire types for the chat feed.
//!
//! PROTOCOL
//! ========
//! Every frame is a JSON object `{"type": ..., "data": {...}}`.
//!
//! Server → client:
//! - `init`    `{messages: Message[]}`  snapshot of the recent window
//! - `message` `{message: Message}`     one live append
//! - `error`   `{message: string}`      server-side complaint
//!
//! Client → server:
//! - `send`    `{content, room, image_urls}`
//!
//! Decoding is lenient: anything that does not fit one of the three inbound
//! shapes decodes to `None` and is dropped by the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fallback text recorded when an `error` frame carries no usable message.
pub const GENERIC_ERROR: &str = "error";

// =============================================================================
// MESSAGE
// =============================================================================

/// A chat message as broadcast by the server. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    /// Unix seconds. The server names this field `created_at`.
    #[serde(default, alias = "created_at")]
    pub timestamp: i64,
}

impl Message {
    /// Name to show for the author: display name when set, else username.
    #[must_use]
    pub fn author(&self) -> &str {
        if self.display_name.trim().is_empty() { &self.username } else { &self.display_name }
    }

    /// Image URLs attached to the message, empty when none.
    #[must_use]
    pub fn images(&self) -> &[String] {
        self.image_urls.as_deref().unwrap_or_default()
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// A decoded server → client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Init(Vec<Message>),
    Message(Message),
    Error(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Decode one inbound text frame. Returns `None` for malformed JSON, unknown
/// `type` values, and shape mismatches alike.
#[must_use]
pub fn parse_inbound(text: &str) -> Option<Inbound> {
    let envelope = serde_json::from_str::<Envelope>(text).ok()?;

    match envelope.kind.as_str() {
        "init" => {
            let messages = match envelope.data.get("messages") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<Message>(item.clone()).ok())
                    .collect(),
                Some(_) => return None,
            };
            Some(Inbound::Init(messages))
        }
        "message" => {
            let raw = envelope.data.get("message")?;
            serde_json::from_value::<Message>(raw.clone()).ok().map(Inbound::Message)
        }
        "error" => {
            let text = match envelope.data.get("message") {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                Some(other) if !is_blank(other) => other.to_string(),
                _ => GENERIC_ERROR.to_owned(),
            };
            Some(Inbound::Error(text))
        }
        _ => None,
    }
}

/// Values that carry no usable error text: null, `false`, zero, `""`.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() < f64::EPSILON),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

/// Client → server frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Outbound {
    Send(SendData),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendData {
    pub content: String,
    pub room: String,
    pub image_urls: Vec<String>,
}

impl Outbound {
    #[must_use]
    pub fn send(content: impl Into<String>, room: impl Into<String>, image_urls: Vec<String>) -> Self {
        Self::Send(SendData { content: content.into(), room: room.into(), image_urls })
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
