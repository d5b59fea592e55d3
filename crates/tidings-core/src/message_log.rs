//! Per-channel message log.
//!
//! Holds the ordered, deduplicated messages of each channel, built from a
//! snapshot load followed by live inserts.
//!
//! # Ordering
//!
//! Feed delivery order is authoritative. Snapshot items keep the order the
//! feed returned them in and live inserts are appended in arrival order.
//! Timestamps are carried but never used to re-sort; if a feed reorders
//! deliveries, the log reflects that order as-is.
//!
//! # Deduplication
//!
//! The feed delivers at-least-once, so the same insertion key can show up
//! twice (snapshot overlap, reconnect replay). Each channel keeps a key set
//! and drops repeats.

use std::collections::{HashMap, HashSet};

use crate::{ChannelId, InsertionKey, Message};

/// Messages of one channel.
#[derive(Debug, Clone, Default)]
struct ChannelLog {
    /// Messages in feed order
    messages: Vec<Message>,
    /// Keys present in `messages`
    keys: HashSet<InsertionKey>,
}

impl ChannelLog {
    fn push(&mut self, message: Message) -> bool {
        if !self.keys.insert(message.key.clone()) {
            return false;
        }
        self.messages.push(message);

        debug_assert_eq!(self.keys.len(), self.messages.len());
        true
    }
}

/// Ordered, deduplicated messages per channel.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    channels: HashMap<ChannelId, ChannelLog>,
}

impl MessageLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the channel's log with a snapshot.
    ///
    /// Keeps the first occurrence of each key, in the given order. Returns
    /// the number of messages kept.
    pub fn load_snapshot(
        &mut self,
        channel_id: &ChannelId,
        messages: impl IntoIterator<Item = Message>,
    ) -> usize {
        let mut log = ChannelLog::default();
        let mut duplicates = 0usize;
        for message in messages {
            if !log.push(message) {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            tracing::debug!(%channel_id, duplicates, "snapshot contained repeated keys");
        }

        let kept = log.messages.len();
        self.channels.insert(channel_id.clone(), log);
        kept
    }

    /// Append a live insert.
    ///
    /// Returns `false` without touching the log if the key is already
    /// present.
    pub fn append_live(&mut self, channel_id: &ChannelId, message: Message) -> bool {
        debug_assert_eq!(&message.channel_id, channel_id);

        self.channels.entry(channel_id.clone()).or_default().push(message)
    }

    /// Messages of a channel in order. Empty if never loaded.
    pub fn messages(&self, channel_id: &ChannelId) -> &[Message] {
        self.channels.get(channel_id).map(|log| log.messages.as_slice()).unwrap_or_default()
    }

    /// Number of messages held for a channel.
    pub fn len(&self, channel_id: &ChannelId) -> usize {
        self.messages(channel_id).len()
    }
}
