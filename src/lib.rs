//! Resilient client for a server-pushed chat feed.
//!
//! The core is [`client::FeedClient`], a single-threaded state machine that
//! owns one WebSocket transport at a time, keeps a bounded window of recent
//! messages, and reconnects with capped exponential backoff. [`runtime`]
//! drives it on Tokio; [`api`] covers the REST calls around the feed.

pub mod api;
pub mod backoff;
pub mod buffer;
pub mod client;
pub mod compose;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod runtime;
pub mod transport;

pub use client::{ConnectionState, FeedClient, FeedOptions, FeedUpdate, FeedView};
pub use config::FeedConfig;
pub use error::FeedError;
pub use message::Message;
pub use runtime::{FeedHandle, FeedService};
