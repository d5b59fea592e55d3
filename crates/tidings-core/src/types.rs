//! Data model shared by every layer of the engine.
//!
//! Channels and messages are immutable once observed. Identifiers are opaque
//! strings assigned by the feed; the engine never parses them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SyncError;

/// Opaque channel identifier assigned by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Wrap a feed-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Server-assigned insertion key of a message within its channel.
///
/// Keys are unique per channel and roughly monotonic, but the engine only
/// relies on uniqueness (dedup), never on their ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InsertionKey(String);

impl InsertionKey {
    /// Wrap a feed-assigned key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InsertionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InsertionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// User who created a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    /// Display name.
    pub name: String,
    /// Avatar reference (URL or blob path).
    pub avatar: String,
}

/// A chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Feed-assigned identifier.
    pub id: ChannelId,
    /// Channel name shown in the channel list.
    pub name: String,
    /// Free-form description.
    pub details: String,
    /// User who created the channel.
    pub created_by: Creator,
}

/// Author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Stable user ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Avatar reference (URL or blob path).
    pub avatar: String,
}

/// Message payload. Exactly one of text or an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageBody {
    /// Plain text content.
    Text(String),
    /// Reference to an uploaded image.
    Image(String),
}

impl MessageBody {
    /// Reject bodies the compose form refuses to send.
    pub fn validate(&self) -> Result<(), SyncError> {
        match self {
            Self::Text(text) if text.trim().is_empty() => {
                Err(SyncError::invalid("message", "add a message"))
            },
            Self::Image(image_ref) if image_ref.trim().is_empty() => {
                Err(SyncError::invalid("image", "image reference is empty"))
            },
            Self::Text(_) | Self::Image(_) => Ok(()),
        }
    }
}

/// A message as observed in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Channel the message belongs to.
    pub channel_id: ChannelId,
    /// Server-assigned insertion key. Dedup key within the channel.
    pub key: InsertionKey,
    /// Server clock in milliseconds. Informational only, never used to sort.
    pub timestamp: i64,
    /// Who sent it.
    pub author: Author,
    /// Text or image.
    pub body: MessageBody,
}

/// One insert as delivered by the feed, before it is bound to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Server-assigned insertion key.
    pub key: InsertionKey,
    /// Server clock in milliseconds.
    pub timestamp: i64,
    /// Who sent it.
    pub author: Author,
    /// Text or image.
    pub body: MessageBody,
}

impl RawEvent {
    /// Bind this event to the channel it was delivered for.
    pub fn into_message(self, channel_id: ChannelId) -> Message {
        Message {
            channel_id,
            key: self.key,
            timestamp: self.timestamp,
            author: self.author,
            body: self.body,
        }
    }
}

/// Create-channel request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChannel {
    /// Channel name.
    pub name: String,
    /// Channel description.
    pub details: String,
    /// Requesting user.
    pub created_by: Creator,
}

impl NewChannel {
    /// Both name and details are required.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.name.trim().is_empty() {
            return Err(SyncError::invalid("name", "channel name is required"));
        }
        if self.details.trim().is_empty() {
            return Err(SyncError::invalid("details", "channel details are required"));
        }
        Ok(())
    }
}

/// Compose request. The feed assigns key and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Sending user.
    pub author: Author,
    /// Text or image.
    pub body: MessageBody,
}

/// Whether the active selection is a public channel or a private
/// conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Channel from the shared channel list.
    #[default]
    Public,
    /// Direct conversation.
    Private,
}

/// Currently selected channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveChannel {
    /// Selected channel.
    pub id: ChannelId,
    /// Public or private.
    pub kind: ChannelKind,
}
