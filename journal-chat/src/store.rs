//! In-memory message log, partitioned by conversation.
//!
//! The store only ever holds server-acknowledged messages. Message ids are
//! the sole deduplication key: the same message may arrive as a snapshot
//! entry, as `message_sent` and as `new_message`, in any order, and is
//! stored once. The only field that ever changes after insertion is the
//! read flag, and only from `false` to `true`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use journal_chat_proto::actor::ActorId;
use journal_chat_proto::message::{ConversationId, Message, MessageId};

type OrderIndex = BTreeMap<(DateTime<Utc>, MessageId), MessageId>;

/// Load state of one conversation's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogState {
    /// Nothing requested or received yet.
    #[default]
    Uninitialized,
    /// Opened; waiting for the snapshot.
    Loading,
    /// Snapshot or first message received. Terminal for the session.
    Ready,
}

/// The message log of a session.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: HashMap<MessageId, Message>,
    /// Per-conversation index, ordered by `(created_at, id)`.
    by_conversation: HashMap<ConversationId, OrderIndex>,
    states: HashMap<ConversationId, LogState>,
}

impl MessageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state of `conversation`.
    #[must_use]
    pub fn state(&self, conversation: ConversationId) -> LogState {
        self.states.get(&conversation).copied().unwrap_or_default()
    }

    /// Marks `conversation` as loading. A ready conversation stays ready.
    pub fn begin_loading(&mut self, conversation: ConversationId) {
        let state = self.states.entry(conversation).or_default();
        if *state == LogState::Uninitialized {
            *state = LogState::Loading;
        }
    }

    /// Merges a snapshot into the store.
    ///
    /// The result is the union by id of what was stored and what the
    /// snapshot carries, so ingesting the same snapshot twice is a no-op.
    /// Every conversation the snapshot touches becomes ready, and so does
    /// every conversation still loading: an empty snapshot is the answer
    /// for a conversation without history. Returns how many messages were
    /// new.
    pub fn ingest(&mut self, snapshot: Vec<Message>) -> usize {
        let mut added = 0;
        for message in snapshot {
            if self.append(message) {
                added += 1;
            }
        }
        for state in self.states.values_mut() {
            if *state == LogState::Loading {
                *state = LogState::Ready;
            }
        }
        added
    }

    /// Appends a single message.
    ///
    /// Returns `false` without inserting if a message with the same id is
    /// already stored; in that case the stored read flag becomes the OR of
    /// both copies. The owning conversation becomes ready either way.
    pub fn append(&mut self, message: Message) -> bool {
        self.states.insert(message.conversation, LogState::Ready);

        if let Some(existing) = self.messages.get_mut(&message.id) {
            if message.read && !existing.read {
                existing.read = true;
            }
            tracing::trace!(message_id = %message.id, "duplicate message ignored");
            return false;
        }

        self.by_conversation
            .entry(message.conversation)
            .or_default()
            .insert(message.order_key(), message.id);
        self.messages.insert(message.id, message);
        true
    }

    /// Flips the read flag of `id` to `true`.
    ///
    /// Returns whether anything changed. Unknown ids and already-read
    /// messages are no-ops.
    pub fn mark_read(&mut self, id: MessageId) -> bool {
        match self.messages.get_mut(&id) {
            Some(message) if !message.read => {
                message.read = true;
                true
            }
            _ => false,
        }
    }

    /// Messages of `conversation`, ordered by creation time then id.
    #[must_use]
    pub fn filter_by_conversation(&self, conversation: ConversationId) -> Vec<&Message> {
        self.by_conversation
            .get(&conversation)
            .map(|index| {
                index
                    .values()
                    .filter_map(|id| self.messages.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Messages exchanged between `a` and `b` in either direction, in the
    /// same order as [`Self::filter_by_conversation`].
    #[must_use]
    pub fn messages_between(&self, a: ActorId, b: ActorId) -> Vec<&Message> {
        let mut out: Vec<&Message> = self
            .messages
            .values()
            .filter(|m| m.is_between(a, b))
            .collect();
        out.sort_by_key(|m| m.order_key());
        out
    }

    /// The stored message with `id`.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(&id)
    }

    /// Every stored message, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    /// Conversations holding at least one message.
    pub fn conversation_ids(&self) -> impl Iterator<Item = ConversationId> + '_ {
        self.by_conversation.keys().copied()
    }

    /// Total number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store holds no message.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
