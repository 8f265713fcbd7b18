//! Derived, read-only aggregates for rendering.
//!
//! Nothing here is cached: every call derives from the store snapshot it
//! borrows, so results always agree with it.

use std::cmp::Ordering;

use journal_chat_proto::actor::{Actor, ActorId};
use journal_chat_proto::message::{ConversationId, Message};

use crate::identity::Directory;
use crate::presence::PresenceTracker;
use crate::store::MessageStore;

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary<'a> {
    /// The counterpart.
    pub actor: &'a Actor,
    /// Conversation the latest message belongs to, if any.
    pub conversation: Option<ConversationId>,
    /// Latest message exchanged with the counterpart.
    pub last_message: Option<&'a Message>,
    /// Unread messages from the counterpart.
    pub unread: usize,
    /// Reachable at the last presence refresh.
    pub online: bool,
}

/// Read-only projection over a session's state.
#[derive(Debug, Clone, Copy)]
pub struct ConversationView<'a> {
    local: ActorId,
    directory: &'a Directory,
    store: &'a MessageStore,
    presence: &'a PresenceTracker,
}

impl<'a> ConversationView<'a> {
    /// Builds a view for the local actor `local`.
    #[must_use]
    pub const fn new(
        local: ActorId,
        directory: &'a Directory,
        store: &'a MessageStore,
        presence: &'a PresenceTracker,
    ) -> Self {
        Self {
            local,
            directory,
            store,
            presence,
        }
    }

    /// Latest message exchanged with `actor`, either direction.
    #[must_use]
    pub fn last_message(&self, actor: ActorId) -> Option<&'a Message> {
        let local = self.local;
        self.store
            .iter()
            .filter(|m| m.is_between(local, actor))
            .max_by_key(|m| m.order_key())
    }

    /// Messages from `actor` to the local actor that are still unread.
    #[must_use]
    pub fn unread_count(&self, actor: ActorId) -> usize {
        self.store
            .iter()
            .filter(|m| m.sender == actor && m.recipient == self.local && !m.read)
            .count()
    }

    /// Unread messages addressed to the local actor, from anyone.
    #[must_use]
    pub fn total_unread(&self) -> usize {
        self.store
            .iter()
            .filter(|m| m.recipient == self.local && m.sender != self.local && !m.read)
            .count()
    }

    /// Whether `actor` is reachable.
    #[must_use]
    pub fn is_online(&self, actor: ActorId) -> bool {
        self.presence.is_online(actor)
    }

    /// Every counterpart, most recently active first. Counterparts with no
    /// message come last, by display name, then id.
    #[must_use]
    pub fn conversation_list(&self) -> Vec<ConversationSummary<'a>> {
        let mut rows: Vec<ConversationSummary<'a>> = self
            .directory
            .iter()
            .map(|actor| {
                let last_message = self.last_message(actor.id);
                ConversationSummary {
                    actor,
                    conversation: last_message.map(|m| m.conversation),
                    last_message,
                    unread: self.unread_count(actor.id),
                    online: self.presence.is_online(actor.id),
                }
            })
            .collect();
        rows.sort_by(compare_rows);
        rows
    }
}

fn compare_rows(a: &ConversationSummary<'_>, b: &ConversationSummary<'_>) -> Ordering {
    match (a.last_message, b.last_message) {
        (Some(x), Some(y)) => y
            .order_key()
            .cmp(&x.order_key())
            .then_with(|| a.actor.id.cmp(&b.actor.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a
            .actor
            .display_name()
            .cmp(&b.actor.display_name())
            .then_with(|| a.actor.id.cmp(&b.actor.id)),
    }
}
