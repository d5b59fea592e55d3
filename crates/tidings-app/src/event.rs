//! Engine input events.
//!
//! This module defines [`EngineEvent`], the inputs the runtime feeds into
//! the [`crate::SyncEngine`] besides UI commands.
//!
//! Events originate from two sources:
//! - Notifications pushed by the feed onto the engine's sink.
//! - Outcomes of actions the runtime executed (subscriptions, snapshot loads).

use tidings_core::{ChannelId, FeedError, FeedEvent, RawEvent, SubscriptionHandle, Watch};

/// Events processed by the sync engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Notification from the feed.
    Feed(FeedEvent),

    /// A requested subscription was established.
    Subscribed {
        /// What it watches.
        watch: Watch,
        /// Feed-assigned handle.
        handle: SubscriptionHandle,
    },

    /// A requested subscription could not be established.
    SubscribeFailed {
        /// What it would have watched.
        watch: Watch,
        /// Reason.
        error: FeedError,
    },

    /// A snapshot load finished.
    SnapshotLoaded {
        /// Loaded channel.
        channel_id: ChannelId,
        /// Generation the load was started with.
        generation: u64,
        /// Channel history in feed order, or the failure.
        result: Result<Vec<RawEvent>, FeedError>,
    },
}
