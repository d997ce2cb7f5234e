//! Outgoing draft validation.
//!
//! A draft may carry text, images, or both. Text is trimmed before it is
//! measured or sent; a draft with neither is rejected, as is text longer than
//! the room's configured maximum.

use crate::client::ConnectionState;

pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 8000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    #[error("message is empty")]
    Empty,
    #[error("message too long (max {max} characters)")]
    TooLong { max: usize },
    #[error("not connected")]
    Disconnected,
}

/// Text plus already-uploaded image URLs waiting to be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub content: String,
    pub image_urls: Vec<String>,
}

/// A validated draft, ready for `send_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub content: String,
    pub image_urls: Vec<String>,
}

impl Draft {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), image_urls: Vec::new() }
    }

    pub fn attach(&mut self, url: impl Into<String>) {
        self.image_urls.push(url.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.image_urls.is_empty()
    }

    /// Validate against the room limit and the current connection state.
    ///
    /// # Errors
    ///
    /// [`ComposeError::Empty`] with no text and no images,
    /// [`ComposeError::TooLong`] when trimmed text exceeds `max_length`
    /// characters, [`ComposeError::Disconnected`] unless `state` is connected.
    pub fn prepare(&self, max_length: usize, state: ConnectionState) -> Result<Outgoing, ComposeError> {
        let content = self.content.trim();
        if content.is_empty() && self.image_urls.is_empty() {
            return Err(ComposeError::Empty);
        }
        if content.chars().count() > max_length {
            return Err(ComposeError::TooLong { max: max_length });
        }
        if state != ConnectionState::Connected {
            return Err(ComposeError::Disconnected);
        }
        Ok(Outgoing { content: content.to_owned(), image_urls: self.image_urls.clone() })
    }

    /// Reset after a successful send.
    pub fn clear(&mut self) {
        self.content.clear();
        self.image_urls.clear();
    }
}

#[cfg(test)]
#[path = "compose_test.rs"]
mod tests;
