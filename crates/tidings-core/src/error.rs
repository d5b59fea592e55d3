//! Error types for the sync engine.
//!
//! Two layers: [`FeedError`] is what an [`crate::EventFeed`] reports, and
//! [`SyncError`] is what the engine returns to (or queues for) the UI. Feed
//! errors are converted at the engine boundary so the UI never sees transport
//! details it cannot act on.

use thiserror::Error;

use crate::ChannelId;

/// Errors reported by an event feed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Snapshot load or subscription failed; the feed could not be reached.
    #[error("feed unavailable: {0}")]
    Unavailable(String),

    /// Insert or create was refused by the feed.
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

impl FeedError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors surfaced by the sync engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Snapshot load or subscription for a channel failed.
    ///
    /// The channel is left with an empty log. Not retried automatically;
    /// re-attach the channel to try again.
    #[error("feed unavailable for channel {channel_id}: {reason}")]
    FeedUnavailable {
        /// Channel whose sync failed
        channel_id: ChannelId,
        /// Underlying feed message
        reason: String,
    },

    /// The channel-list subscription failed. Known channels stay readable;
    /// no new channels are discovered until the engine restarts.
    #[error("channel list unavailable: {0}")]
    ChannelListUnavailable(String),

    /// Insert or create was refused. The caller still holds the input and
    /// may resubmit.
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// Operation referenced a channel the registry does not know.
    #[error("channel not found: {0}")]
    NotFound(ChannelId),

    /// Input failed local validation before reaching the feed.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Human-readable reason
        reason: String,
    },

    /// Snapshot load was cancelled because the channel was switched away
    /// from or detached before it completed.
    #[error("snapshot for channel {0} was cancelled")]
    Cancelled(ChannelId),

    /// The engine runtime has shut down.
    #[error("sync engine is closed")]
    Closed,
}

impl SyncError {
    /// Validation failure for `field`.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }

    /// Convert a feed error that occurred while syncing `channel_id`.
    pub fn from_feed(channel_id: &ChannelId, err: FeedError) -> Self {
        match err {
            FeedError::Unavailable(reason) => {
                Self::FeedUnavailable { channel_id: channel_id.clone(), reason }
            },
            FeedError::WriteRejected(reason) => Self::WriteRejected(reason),
        }
    }

    /// Convert a feed error from a write (message push or channel create).
    ///
    /// Every failed write is reported as [`SyncError::WriteRejected`], so
    /// the caller keeps its compose input either way.
    pub fn from_write(err: FeedError) -> Self {
        match err {
            FeedError::Unavailable(reason) | FeedError::WriteRejected(reason) => {
                Self::WriteRejected(reason)
            },
        }
    }

    /// Returns true if retrying the same operation may succeed.
    ///
    /// Feed outages and cancellations are transient. Unknown channels and
    /// invalid input will fail the same way every time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FeedUnavailable { .. } | Self::ChannelListUnavailable(_) | Self::Cancelled(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_errors_map_to_sync_errors() {
        let channel_id = ChannelId::new("c1");

        let err = SyncError::from_feed(&channel_id, FeedError::Unavailable("offline".into()));
        assert_eq!(
            err,
            SyncError::FeedUnavailable { channel_id: channel_id.clone(), reason: "offline".into() }
        );

        let err = SyncError::from_feed(&channel_id, FeedError::WriteRejected("denied".into()));
        assert_eq!(err, SyncError::WriteRejected("denied".into()));
    }

    #[test]
    fn failed_writes_are_rejections() {
        let err = SyncError::from_write(FeedError::Unavailable("offline".into()));
        assert_eq!(err, SyncError::WriteRejected("offline".into()));

        let err = SyncError::from_write(FeedError::WriteRejected("denied".into()));
        assert_eq!(err, SyncError::WriteRejected("denied".into()));
    }

    #[test]
    fn sync_error_display() {
        let err = SyncError::NotFound(ChannelId::new("c9"));
        assert_eq!(err.to_string(), "channel not found: c9");

        let err = SyncError::FeedUnavailable { channel_id: "c1".into(), reason: "timeout".into() };
        assert_eq!(err.to_string(), "feed unavailable for channel c1: timeout");

        let err = SyncError::invalid("message", "add a message");
        assert_eq!(err.to_string(), "invalid message: add a message");
    }

    #[test]
    fn outages_are_transient() {
        assert!(FeedError::Unavailable("x".into()).is_transient());
        assert!(!FeedError::WriteRejected("x".into()).is_transient());

        assert!(SyncError::Cancelled("c1".into()).is_transient());
        assert!(SyncError::ChannelListUnavailable("reset".into()).is_transient());
        assert!(!SyncError::NotFound("c1".into()).is_transient());
        assert!(!SyncError::invalid("name", "required").is_transient());
    }
}
