//! Engine side-effects.
//!
//! This module defines the [`EngineAction`] enum, which represents
//! instructions produced by the [`crate::SyncEngine`] for the runtime to
//! execute against the feed.

use tidings_core::{ChannelId, SubscriptionHandle, SyncError, Watch};

/// Actions produced by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    /// Subscribe to a watch and report back with
    /// [`crate::EngineEvent::Subscribed`] or
    /// [`crate::EngineEvent::SubscribeFailed`].
    Subscribe {
        /// What to watch.
        watch: Watch,
    },

    /// Release a subscription.
    Unsubscribe {
        /// Handle to release.
        handle: SubscriptionHandle,
    },

    /// Start loading a channel's history and report back with
    /// [`crate::EngineEvent::SnapshotLoaded`].
    LoadSnapshot {
        /// Channel to load.
        channel_id: ChannelId,
        /// Generation to tag the result with.
        generation: u64,
    },

    /// Abort an in-flight snapshot load.
    CancelSnapshot {
        /// Channel being loaded.
        channel_id: ChannelId,
        /// Generation to abort.
        generation: u64,
    },

    /// A snapshot generation ended. Callers waiting on it get `result`.
    SnapshotSettled {
        /// Channel that was loading.
        channel_id: ChannelId,
        /// Generation that ended.
        generation: u64,
        /// Applied, failed, or cancelled.
        result: Result<(), SyncError>,
    },

    /// Observable state changed.
    Changed,
}
