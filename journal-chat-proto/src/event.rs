//! The enumerated event vocabulary of the persistent event channel.

use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::message::{Message, MessageId};

/// Wire names of client → server events.
pub mod names {
    /// Binds the connection to an actor's inbox.
    pub const JOIN_USER: &str = "join_user";
    /// Sends a chat message.
    pub const SEND_MESSAGE: &str = "send_message";
    /// Marks a received message as read.
    pub const MARK_AS_READ: &str = "mark_as_read";
    /// Requests the set of reachable actors (answered through an ack).
    pub const GET_ONLINE_USERS: &str = "get_online_users";
    /// Requests the message snapshot of one pair.
    pub const LOAD_MESSAGES: &str = "load_messages";

    /// Bulk message snapshot.
    pub const LOAD_PREVIOUS_MESSAGES: &str = "load_previous_messages";
    /// Broadcast of a newly created message.
    pub const NEW_MESSAGE: &str = "new_message";
    /// Acknowledgment of the sender's own message.
    pub const MESSAGE_SENT: &str = "message_sent";
    /// A message was marked as read.
    pub const MESSAGE_READ: &str = "message_read";
}

/// Payload of `join_user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinUser {
    /// The local actor.
    pub user_id: ActorId,
}

/// Payload of `send_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// The sender (the local actor).
    pub from_id: ActorId,
    /// The recipient.
    pub to_id: ActorId,
    /// Message text.
    pub message: String,
}

/// Payload of `mark_as_read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsRead {
    /// The message being marked.
    pub message_id: MessageId,
    /// The reader (recipient of the message).
    pub to_id: ActorId,
}

/// Payload of `load_messages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadMessages {
    /// The local actor.
    pub from_id: ActorId,
    /// The counterpart.
    pub to_id: ActorId,
}

/// Ack payload answering `get_online_users`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsers {
    /// Currently reachable actors.
    pub online_users: Vec<ActorId>,
}

/// Events the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// `join_user` (identify).
    JoinUser(JoinUser),
    /// `send_message`.
    SendMessage(SendMessage),
    /// `mark_as_read`.
    MarkAsRead(MarkAsRead),
    /// `get_online_users`.
    GetOnlineUsers,
    /// `load_messages`.
    LoadMessages(LoadMessages),
}

impl ClientEvent {
    /// The wire name of this event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::JoinUser(_) => names::JOIN_USER,
            Self::SendMessage(_) => names::SEND_MESSAGE,
            Self::MarkAsRead(_) => names::MARK_AS_READ,
            Self::GetOnlineUsers => names::GET_ONLINE_USERS,
            Self::LoadMessages(_) => names::LOAD_MESSAGES,
        }
    }
}

/// Events the server pushes to the client, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// `load_previous_messages`: a snapshot of prior messages.
    LoadPreviousMessages {
        /// The valid messages of the snapshot.
        messages: Vec<Message>,
        /// How many entries were dropped as malformed.
        dropped: usize,
    },
    /// `new_message`: broadcast of a message.
    NewMessage(Message),
    /// `message_sent`: acknowledgment of the local actor's send.
    MessageSent(Message),
    /// `message_read`: the message is now read.
    MessageRead(Message),
}

impl ServerEvent {
    /// The wire name of this event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LoadPreviousMessages { .. } => names::LOAD_PREVIOUS_MESSAGES,
            Self::NewMessage(_) => names::NEW_MESSAGE,
            Self::MessageSent(_) => names::MESSAGE_SENT,
            Self::MessageRead(_) => names::MESSAGE_READ,
        }
    }
}
