//! Conversations and chat messages.
//!
//! Messages arrive from the event channel in a loosely-typed JSON shape.
//! [`WireMessage`] captures that shape with every field optional, and
//! [`Message`] is produced from it only when all required fields are
//! present. Internal components never see partial messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::ActorId;

/// Server-assigned message identifier, the sole deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// Creates a message identifier from its server-assigned value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned conversation identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(u64);

impl ConversationId {
    /// Creates a conversation identifier from its server-assigned value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A server-recognized pairing of two actors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Server-assigned identifier.
    pub id: ConversationId,
    /// The actor that created the conversation.
    pub from_id: ActorId,
    /// The other side.
    pub to_id: ActorId,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Returns the side of the pair that is not `local`, or `None` when
    /// `local` is not a participant.
    #[must_use]
    pub fn counterpart_of(&self, local: ActorId) -> Option<ActorId> {
        if self.from_id == local {
            Some(self.to_id)
        } else if self.to_id == local {
            Some(self.from_id)
        } else {
            None
        }
    }
}

/// A validated, server-confirmed chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique, monotonically assigned identifier.
    pub id: MessageId,
    /// Who sent the message.
    pub sender: ActorId,
    /// Who the message is addressed to.
    pub recipient: ActorId,
    /// Message text.
    pub body: String,
    /// Server creation time.
    pub created_at: DateTime<Utc>,
    /// Whether the recipient has read the message. Only moves false → true.
    pub read: bool,
    /// Owning conversation.
    pub conversation: ConversationId,
}

impl Message {
    /// Whether this message travels between `a` and `b`, in either direction.
    #[must_use]
    pub fn is_between(&self, a: ActorId, b: ActorId) -> bool {
        (self.sender == a && self.recipient == b) || (self.sender == b && self.recipient == a)
    }

    /// Ordering key used everywhere messages are listed: creation time, then id.
    #[must_use]
    pub const fn order_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.created_at, self.id)
    }
}

/// A message exactly as it appears on the wire; every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Message identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Sender identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<ActorId>,
    /// Recipient identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<ActorId>,
    /// Message text. Missing text decodes as empty.
    #[serde(default)]
    pub message: String,
    /// Read flag. Missing means unread.
    #[serde(default)]
    pub is_read: bool,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Owning conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_user_chat_id: Option<ConversationId>,
}

/// Error returned when a wire message lacks a required field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedMessage {
    /// A required field is absent.
    #[error("message is missing `{0}`")]
    MissingField(&'static str),
}

impl TryFrom<WireMessage> for Message {
    type Error = MalformedMessage;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        Ok(Self {
            id: wire.id.ok_or(MalformedMessage::MissingField("id"))?,
            conversation: wire
                .article_user_chat_id
                .ok_or(MalformedMessage::MissingField("articleUserChatId"))?,
            sender: wire.from_id.ok_or(MalformedMessage::MissingField("fromId"))?,
            recipient: wire.to_id.ok_or(MalformedMessage::MissingField("toId"))?,
            created_at: wire
                .created_at
                .ok_or(MalformedMessage::MissingField("createdAt"))?,
            body: wire.message,
            read: wire.is_read,
        })
    }
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            id: Some(msg.id),
            from_id: Some(msg.sender),
            to_id: Some(msg.recipient),
            message: msg.body.clone(),
            is_read: msg.read,
            created_at: Some(msg.created_at),
            article_user_chat_id: Some(msg.conversation),
        }
    }
}
