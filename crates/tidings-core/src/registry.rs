//! Channel registry.
//!
//! Keeps every known channel in the order it was first seen and tracks which
//! one is active. Lookups by id go through an index map so insertion order
//! and O(1) access coexist.

use std::collections::HashMap;

use crate::{Channel, ChannelId, SyncError};

/// Known channels plus the active selection.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    /// Channels in first-seen order
    channels: Vec<Channel>,
    /// Channel ID → position in `channels`
    index: HashMap<ChannelId, usize>,
    /// Currently active channel. `None` until one is selected
    active: Option<ChannelId>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel.
    ///
    /// Idempotent by id: a channel seen before keeps its original position
    /// and contents. Returns `true` on the channel's first appearance.
    pub fn add_channel(&mut self, channel: Channel) -> bool {
        if self.index.contains_key(&channel.id) {
            return false;
        }

        self.index.insert(channel.id.clone(), self.channels.len());
        self.channels.push(channel);

        debug_assert_eq!(self.index.len(), self.channels.len());
        true
    }

    /// Channels in first-seen order.
    ///
    /// Lazy and finite; call again to restart.
    pub fn channels(&self) -> impl ExactSizeIterator<Item = &Channel> + '_ {
        self.channels.iter()
    }

    /// Select `channel_id` as the active channel.
    pub fn set_active(&mut self, channel_id: &ChannelId) -> Result<(), SyncError> {
        if !self.contains(channel_id) {
            return Err(SyncError::NotFound(channel_id.clone()));
        }
        self.active = Some(channel_id.clone());
        Ok(())
    }

    /// Currently active channel. `None` if nothing is selected.
    pub fn active(&self) -> Option<&ChannelId> {
        self.active.as_ref()
    }

    /// Check whether `channel_id` is the active channel.
    pub fn is_active(&self, channel_id: &ChannelId) -> bool {
        self.active.as_ref() == Some(channel_id)
    }

    /// Channel by id. `None` if unknown.
    pub fn get(&self, channel_id: &ChannelId) -> Option<&Channel> {
        self.index.get(channel_id).and_then(|&position| self.channels.get(position))
    }

    /// Check if a channel is registered.
    pub fn contains(&self, channel_id: &ChannelId) -> bool {
        self.index.contains_key(channel_id)
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Check if no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
