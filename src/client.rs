//! Realtime feed client core.
//!
//! DESIGN
//! ======
//! `FeedClient` is a single-threaded state machine. Its owner calls the
//! command methods (`set_enabled`, `connect`, `reconnect`, `send_message`,
//! `teardown`) and delivers transport/timer callbacks one at a time through
//! `handle_transport` and `handle_timer`. Nothing here blocks or spawns.
//!
//! LIFECYCLE
//! =========
//! 1. `set_enabled(true)` → `connect` → state `Connecting`
//! 2. `Open` → state `Connected`, backoff reset
//! 3. `Close` of the owned transport → state `Disconnected` → reconnect timer
//! 4. Timer fires → attempt counter advances → `connect`
//! 5. `set_enabled(false)` / `teardown` → timer cancelled, transport closed
//!
//! STALE CALLBACKS
//! ===============
//! Each transport gets a fresh generation id and each timer a fresh timer id.
//! Callbacks whose id does not match the currently owned one are dropped, so
//! a late close from a superseded transport cannot reschedule anything.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backoff::{Backoff, BackoffPolicy};
use crate::buffer::MessageBuffer;
use crate::endpoint::{self, Endpoint, FEED_SUBPROTOCOL};
use crate::message::{self, Inbound, Message, Outbound};
use crate::transport::{ConnectRequest, Connector, Generation, Scheduler, TimerId, Transport, TransportEvent};

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable change emitted by the core, drained with [`FeedClient::take_updates`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
    State(ConnectionState),
    /// The buffer was replaced wholesale (snapshot or limit change).
    Snapshot(Vec<Message>),
    Appended(Message),
    /// Last error changed. `None` means cleared.
    Error(Option<String>),
}

/// Read-only view of everything a display layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedView {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub messages: Vec<Message>,
}

/// Construction parameters for [`FeedClient`].
#[derive(Debug, Clone)]
pub struct FeedOptions {
    pub endpoint: Endpoint,
    pub room: String,
    /// Zero means unbounded.
    pub message_limit: usize,
    pub backoff: BackoffPolicy,
}

struct ActiveTransport<T> {
    generation: Generation,
    transport: T,
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct FeedClient<C: Connector, S: Scheduler> {
    connector: C,
    scheduler: S,
    endpoint: Endpoint,
    room: String,
    enabled: bool,

    active: Option<ActiveTransport<C::Transport>>,
    next_generation: Generation,
    pending_timer: Option<TimerId>,
    next_timer: u64,
    backoff: Backoff,

    buffer: MessageBuffer,
    state: ConnectionState,
    last_error: Option<String>,
    updates: Vec<FeedUpdate>,
}

impl<C: Connector, S: Scheduler> FeedClient<C, S> {
    /// Create a disabled client. Nothing connects until `set_enabled(true)`.
    pub fn new(options: FeedOptions, connector: C, scheduler: S) -> Self {
        Self {
            connector,
            scheduler,
            endpoint: options.endpoint,
            room: endpoint::normalize_room(&options.room).to_owned(),
            enabled: false,
            active: None,
            next_generation: 0,
            pending_timer: None,
            next_timer: 0,
            backoff: Backoff::new(options.backoff),
            buffer: MessageBuffer::new(options.message_limit),
            state: ConnectionState::Disconnected,
            last_error: None,
            updates: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.buffer.iter()
    }

    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn view(&self) -> FeedView {
        FeedView { state: self.state, last_error: self.last_error.clone(), messages: self.buffer.to_vec() }
    }

    /// Drain updates accumulated since the previous call.
    pub fn take_updates(&mut self) -> Vec<FeedUpdate> {
        std::mem::take(&mut self.updates)
    }

    #[must_use]
    pub fn has_pending_reconnect(&self) -> bool {
        self.pending_timer.is_some()
    }

    #[must_use]
    pub fn reconnect_attempt(&self) -> u32 {
        self.backoff.attempt()
    }

    #[must_use]
    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut C {
        &mut self.connector
    }

    #[must_use]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Apply the externally derived `enabled` flag.
    ///
    /// false → true connects; true → false tears down and forces
    /// `Disconnected` even when a connection attempt is in flight.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.connect();
        } else {
            self.teardown();
        }
    }

    /// Switch rooms. While enabled this is a fresh connect.
    pub fn set_room(&mut self, room: &str) {
        let room = endpoint::normalize_room(room);
        if room == self.room {
            return;
        }
        room.clone_into(&mut self.room);
        if self.enabled {
            self.connect();
        }
    }

    /// Change the buffer capacity. Trims immediately and, while enabled,
    /// reconnects so the server snapshot matches the new window.
    pub fn set_message_limit(&mut self, limit: usize) {
        if limit == self.buffer.limit() {
            return;
        }
        let before = self.buffer.len();
        self.buffer.set_limit(limit);
        if self.buffer.len() != before {
            self.updates.push(FeedUpdate::Snapshot(self.buffer.to_vec()));
        }
        if self.enabled {
            self.connect();
        }
    }

    /// Replace any existing transport with a new one for the current room.
    pub fn connect(&mut self) {
        if !self.enabled {
            return;
        }
        self.release();
        self.set_last_error(None);
        self.set_state(ConnectionState::Connecting);

        self.next_generation += 1;
        let generation = self.next_generation;
        let url = self.endpoint.feed_url(&self.room);
        debug!(generation, room = %self.room, %url, "feed: connecting");

        let transport = self.connector.open(ConnectRequest {
            url,
            protocols: vec![FEED_SUBPROTOCOL.to_owned()],
            generation,
        });
        self.active = Some(ActiveTransport { generation, transport });
    }

    /// User-initiated recovery: reset backoff and connect now.
    pub fn reconnect(&mut self) {
        self.backoff.reset();
        self.connect();
    }

    /// Fire-and-forget send. Returns `false` without side effects unless the
    /// owned transport is open.
    pub fn send_message(&mut self, content: &str, image_urls: Vec<String>) -> bool {
        if self.state != ConnectionState::Connected {
            return false;
        }
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        let frame = Outbound::send(content, self.room.as_str(), image_urls);
        let Ok(text) = serde_json::to_string(&frame) else {
            return false;
        };
        let sent = active.transport.send(text);
        if !sent {
            warn!(generation = active.generation, "feed: send on closed transport");
        }
        sent
    }

    /// Cancel the pending timer, close and forget the transport, and settle in
    /// `Disconnected`. Safe to call any number of times.
    pub fn teardown(&mut self) {
        self.release();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Arm a reconnect timer using the current backoff delay.
    ///
    /// No-op while disabled or when a timer is already pending.
    pub fn schedule_reconnect(&mut self) {
        if !self.enabled || self.pending_timer.is_some() {
            return;
        }
        let delay = self.backoff.next_delay();
        self.next_timer += 1;
        let timer = TimerId(self.next_timer);
        self.pending_timer = Some(timer);
        info!(
            attempt = self.backoff.attempt(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "feed: reconnect scheduled"
        );
        self.scheduler.schedule(timer, delay);
    }

    // -------------------------------------------------------------------------
    // Callbacks
    // -------------------------------------------------------------------------

    /// Deliver a transport event. Events from any generation other than the
    /// currently owned one are ignored.
    pub fn handle_transport(&mut self, generation: Generation, event: TransportEvent) {
        if self.active.as_ref().map(|a| a.generation) != Some(generation) {
            debug!(generation, ?event, "feed: dropping stale transport event");
            return;
        }

        match event {
            TransportEvent::Open => {
                info!(generation, room = %self.room, "feed: connected");
                self.backoff.reset();
                self.set_state(ConnectionState::Connected);
            }
            TransportEvent::Text(text) => self.apply_frame(&text),
            TransportEvent::Error(error) => {
                warn!(generation, %error, "feed: transport error");
                self.set_last_error(Some(error));
            }
            TransportEvent::Close => {
                info!(generation, "feed: disconnected");
                self.active = None;
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    /// Deliver a timer firing. Only the currently pending timer is honored.
    pub fn handle_timer(&mut self, timer: TimerId) {
        if self.pending_timer != Some(timer) {
            debug!(?timer, "feed: dropping stale timer");
            return;
        }
        self.pending_timer = None;
        self.backoff.advance();
        self.connect();
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn apply_frame(&mut self, text: &str) {
        let Some(frame) = message::parse_inbound(text) else {
            debug!(len = text.len(), "feed: ignoring unrecognized frame");
            return;
        };
        match frame {
            Inbound::Init(messages) => {
                self.buffer.replace(messages);
                self.updates.push(FeedUpdate::Snapshot(self.buffer.to_vec()));
            }
            Inbound::Message(m) => {
                self.buffer.push(m.clone());
                self.updates.push(FeedUpdate::Appended(m));
            }
            Inbound::Error(text) => self.set_last_error(Some(text)),
        }
    }

    /// Cancel the timer and close the transport without touching state.
    fn release(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            self.scheduler.cancel(timer);
        }
        if let Some(mut active) = self.active.take() {
            debug!(generation = active.generation, "feed: closing transport");
            active.transport.close();
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.updates.push(FeedUpdate::State(state));
        }
    }

    fn set_last_error(&mut self, error: Option<String>) {
        if self.last_error != error {
            self.last_error.clone_from(&error);
            self.updates.push(FeedUpdate::Error(error));
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
