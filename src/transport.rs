//! Seams between the feed client core and the outside world.
//!
//! DESIGN
//! ======
//! The core never performs I/O or sleeps. It asks a [`Connector`] to open a
//! transport and a [`Scheduler`] to arm a timer, and its owner later feeds
//! back what happened through `FeedClient::handle_transport` and
//! `FeedClient::handle_timer`. Every transport is tagged with a
//! [`Generation`] and every timer with a [`TimerId`]; callbacks carrying an
//! id the core no longer owns are discarded.

use std::time::Duration;

use reqwest::Url;

/// Monotonically increasing tag distinguishing successive transports.
pub type Generation = u64;

/// Identifies one armed reconnect timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Something that happened on a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Text(String),
    Error(String),
    /// Always the last event of a transport. Follows `Error` on failures.
    Close,
}

/// What the core asks a connector to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: Url,
    pub protocols: Vec<String>,
    pub generation: Generation,
}

/// An open (or opening) bidirectional connection owned by the core.
pub trait Transport {
    /// Queue a text frame. Returns `false` if the transport can no longer send.
    fn send(&mut self, text: String) -> bool;

    /// Close the connection. Events it emits afterwards are stale.
    fn close(&mut self);
}

/// Opens transports. Opening never fails synchronously: failures are
/// reported as `Error` followed by `Close` under the request's generation.
pub trait Connector {
    type Transport: Transport;

    fn open(&mut self, request: ConnectRequest) -> Self::Transport;
}

/// Arms and cancels one-shot timers that fire back into the core.
pub trait Scheduler {
    fn schedule(&mut self, timer: TimerId, delay: Duration);

    fn cancel(&mut self, timer: TimerId);
}
