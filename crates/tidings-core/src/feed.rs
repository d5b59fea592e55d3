//! Event feed abstraction.
//!
//! Decouples the engine from the hosted realtime database that stores
//! channels and messages. Production code talks to a remote service; tests
//! and the demo binary use an in-process feed.
//!
//! Subscriptions do not take callbacks. Every notification is pushed as a
//! [`FeedEvent`] value onto a [`FeedSink`], and the engine drains that queue
//! from a single task, so no mutable state is shared between notifications.

use std::{fmt, future::Future};

use tokio::sync::mpsc;

use crate::{Channel, ChannelId, FeedError, InsertionKey, NewChannel, NewMessage, RawEvent};

/// Queue the feed pushes notifications onto.
///
/// Unbounded because feed notifications are produced synchronously and must
/// never block the feed.
pub type FeedSink = mpsc::UnboundedSender<FeedEvent>;

/// Opaque handle identifying one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Wrap a feed-assigned subscription number.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw subscription number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Watch {
    /// The channel list. Existing channels are reported on subscribe, then
    /// every newly created channel.
    Channels,

    /// Inserts into one channel, from the moment of subscription.
    Messages(ChannelId),

    /// Item count of one channel. Reported on subscribe and after every
    /// insert.
    Cardinality(ChannelId),
}

/// Notification pushed by the feed onto a subscriber's sink.
///
/// Every variant carries the handle of the subscription that produced it so
/// the consumer can drop notifications from subscriptions it has already
/// released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// A channel appeared in the channel list.
    ChannelAdded {
        /// Producing subscription.
        subscription: SubscriptionHandle,
        /// The channel.
        channel: Channel,
    },

    /// A message was inserted into a channel.
    Inserted {
        /// Producing subscription.
        subscription: SubscriptionHandle,
        /// Target channel.
        channel_id: ChannelId,
        /// The insert.
        event: RawEvent,
    },

    /// Current item count of a channel.
    Cardinality {
        /// Producing subscription.
        subscription: SubscriptionHandle,
        /// Observed channel.
        channel_id: ChannelId,
        /// Number of messages in the channel.
        total: u64,
    },

    /// The subscription failed. No further events follow from it.
    Error {
        /// Failed subscription.
        subscription: SubscriptionHandle,
        /// What it was watching.
        watch: Watch,
        /// Reason.
        error: FeedError,
    },
}

/// Append-only, per-channel ordered event source.
///
/// Implementations share their state across clones (typically through an
/// `Arc`), so a clone handed to a spawned task observes the same feed.
///
/// # Invariants
///
/// - Within one channel, inserts are delivered in feed order and
///   `load_snapshot` returns items in that same order.
/// - Delivery is at-least-once: the same [`InsertionKey`] may be delivered
///   more than once across reconnects.
/// - After `unsubscribe(handle)` returns, no new events are pushed for
///   `handle`. Events already queued may still be drained by the consumer.
pub trait EventFeed: Send + Sync + 'static {
    /// Everything stored for `channel_id` so far, in feed order.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Unavailable`] if the feed cannot be reached.
    fn load_snapshot(
        &self,
        channel_id: &ChannelId,
    ) -> impl Future<Output = Result<Vec<RawEvent>, FeedError>> + Send;

    /// Start pushing notifications for `watch` onto `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Unavailable`] if the subscription cannot be
    /// established.
    fn subscribe(&self, watch: &Watch, sink: FeedSink) -> Result<SubscriptionHandle, FeedError>;

    /// Stop a subscription. Unknown handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Create a channel and return its feed-assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::WriteRejected`] if the feed refuses the write.
    fn create_channel(
        &self,
        fields: NewChannel,
    ) -> impl Future<Output = Result<ChannelId, FeedError>> + Send;

    /// Append a message to `channel_id` and return its insertion key.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::WriteRejected`] if the feed refuses the write.
    fn push_message(
        &self,
        channel_id: &ChannelId,
        message: NewMessage,
    ) -> impl Future<Output = Result<InsertionKey, FeedError>> + Send;
}
