//! Core state for the Tidings channel sync engine.
//!
//! Pure, synchronous building blocks that turn a per-channel append-only
//! event stream into what a chat UI renders: an ordered, deduplicated message
//! list per channel and unread badges that survive channel switches,
//! late-attaching listeners and reconnects.
//!
//! # Components
//!
//! - [`ChannelRegistry`]: known channels in first-seen order, active channel
//! - [`MessageLog`]: per-channel deduplicated messages in feed order
//! - [`NotificationTracker`]: per-channel unread counters from cardinality
//!   reports
//! - [`EventFeed`]: trait for the external event source the engine consumes
//!
//! Orchestration (subscription lifecycle, snapshot loads, cancellation) lives
//! in `tidings-app`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
pub mod feed;
mod message_log;
mod notification;
mod registry;
mod types;

pub use error::{FeedError, SyncError};
pub use feed::{EventFeed, FeedEvent, FeedSink, SubscriptionHandle, Watch};
pub use message_log::MessageLog;
pub use notification::{Counters, NotificationState, NotificationTracker, Observation};
pub use registry::ChannelRegistry;
pub use types::{
    ActiveChannel, Author, Channel, ChannelId, ChannelKind, Creator, InsertionKey, Message,
    MessageBody, NewChannel, NewMessage, RawEvent,
};
