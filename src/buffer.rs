//! Bounded recent-message window.
//!
//! Holds messages in arrival order. When the limit is exceeded the oldest
//! entries are dropped from the front, so the newest `limit` messages are
//! always retained. A limit of zero means unbounded.

use std::collections::VecDeque;

use crate::message::Message;

#[derive(Debug, Clone, Default)]
pub struct MessageBuffer {
    messages: VecDeque<Message>,
    limit: usize,
}

impl MessageBuffer {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { messages: VecDeque::new(), limit }
    }

    /// Zero means unbounded.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the capacity and trim immediately.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.trim();
    }

    /// Replace the contents with a snapshot, keeping only its tail.
    pub fn replace(&mut self, snapshot: Vec<Message>) {
        let skip = if self.limit > 0 { snapshot.len().saturating_sub(self.limit) } else { 0 };
        self.messages = snapshot.into_iter().skip(skip).collect();
    }

    /// Append one message and evict from the front if over capacity.
    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        self.trim();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    fn trim(&mut self) {
        if self.limit == 0 {
            return;
        }
        while self.messages.len() > self.limit {
            self.messages.pop_front();
        }
    }
}

/// Map a raw configured limit to a buffer capacity: non-positive means unbounded.
#[must_use]
pub fn capacity_from(raw: i64) -> usize {
    usize::try_from(raw).unwrap_or(0)
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod tests;
