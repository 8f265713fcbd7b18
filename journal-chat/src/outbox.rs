//! Optimistic overlay for sends awaiting acknowledgement.
//!
//! Pending sends live here, never in the [`crate::store::MessageStore`].
//! An entry exists only after the transport accepted the frame; it is
//! discarded when the server echoes the message back.

use chrono::{DateTime, Utc};
use journal_chat_proto::actor::ActorId;
use journal_chat_proto::message::Message;
use uuid::Uuid;

/// A send the server has not acknowledged yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    /// Client-side id, only meaningful within this overlay.
    pub local_id: Uuid,
    /// Recipient.
    pub to: ActorId,
    /// Trimmed body as sent.
    pub body: String,
    /// When the frame was handed to the transport.
    pub queued_at: DateTime<Utc>,
}

/// Sends awaiting acknowledgement, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    pending: Vec<PendingSend>,
}

impl Outbox {
    /// Creates an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a send and returns its local id.
    pub fn push(&mut self, to: ActorId, body: impl Into<String>) -> Uuid {
        let local_id = Uuid::now_v7();
        self.pending.push(PendingSend {
            local_id,
            to,
            body: body.into(),
            queued_at: Utc::now(),
        });
        local_id
    }

    /// Discards the oldest pending send matched by an acknowledged
    /// message from `local`. Returns the discarded entry.
    ///
    /// Call this once per newly stored message; a repeated copy of the
    /// same message must not consume another entry.
    pub fn reconcile(&mut self, acked: &Message, local: ActorId) -> Option<PendingSend> {
        self.take_match(acked, local, |_| true)
    }

    /// Like [`Self::reconcile`] for a message learned from a history
    /// snapshot: only entries queued no later than the message was created
    /// can match, so an older message with the same text is left alone.
    pub fn reconcile_from_history(
        &mut self,
        acked: &Message,
        local: ActorId,
    ) -> Option<PendingSend> {
        self.take_match(acked, local, |p| p.queued_at <= acked.created_at)
    }

    fn take_match(
        &mut self,
        acked: &Message,
        local: ActorId,
        eligible: impl Fn(&PendingSend) -> bool,
    ) -> Option<PendingSend> {
        if acked.sender != local {
            return None;
        }
        let pos = self
            .pending
            .iter()
            .position(|p| p.to == acked.recipient && p.body == acked.body && eligible(p))?;
        let entry = self.pending.remove(pos);
        tracing::debug!(
            local_id = %entry.local_id,
            message_id = %acked.id,
            "pending send acknowledged"
        );
        Some(entry)
    }

    /// Pending sends addressed to `to`, oldest first.
    #[must_use]
    pub fn pending_for(&self, to: ActorId) -> Vec<&PendingSend> {
        self.pending.iter().filter(|p| p.to == to).collect()
    }

    /// Drops a pending send, e.g. when the user gives up on it.
    pub fn discard(&mut self, local_id: Uuid) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.local_id != local_id);
        self.pending.len() != before
    }

    /// Drops every pending send. Used when the connection is lost, since
    /// an acknowledgement can no longer arrive on it.
    pub fn clear(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    /// Number of pending sends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
