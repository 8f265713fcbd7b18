//! Conversation registry: counterpart → conversation handle.
//!
//! A conversation is created lazily, on the first interaction with a
//! counterpart. Creation is serialized per counterpart: concurrent
//! [`ConversationRegistry::open`] calls for the same counterpart share a
//! single in-flight request and resolve to the same id. A failed request
//! leaves no entry behind, so a later call retries.

use std::collections::HashMap;
use std::sync::Arc;

use journal_chat_proto::actor::ActorId;
use journal_chat_proto::message::{Conversation, ConversationId};
use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::api::{ApiError, ChatApi};

type Slot = Arc<OnceCell<ConversationId>>;

/// Maps each counterpart to its conversation once resolved.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    slots: Mutex<HashMap<ActorId, Slot>>,
}

impl ConversationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the conversation with `counterpart`, creating it on the
    /// server if it is not known yet.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of the create-or-fetch request; the
    /// registry is left unchanged. A caller that was waiting on a failed
    /// request issues its own, still one at a time.
    pub async fn open<A: ChatApi>(
        &self,
        counterpart: ActorId,
        api: &A,
    ) -> Result<ConversationId, ApiError> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(counterpart).or_default())
        };

        slot.get_or_try_init(|| async {
            tracing::debug!(counterpart = %counterpart, "creating conversation");
            let conversation = api.open_conversation(counterpart).await?;
            tracing::info!(
                counterpart = %counterpart,
                conversation_id = %conversation.id,
                "conversation resolved"
            );
            Ok::<_, ApiError>(conversation.id)
        })
        .await
        .copied()
        .inspect_err(|e| {
            tracing::warn!(counterpart = %counterpart, error = %e, "conversation open failed");
        })
    }

    /// Pre-populates the registry from the local actor's existing
    /// conversations. Known counterparts keep their current handle.
    pub fn seed(&self, conversations: &[Conversation], local: ActorId) {
        let mut slots = self.slots.lock();
        for conversation in conversations {
            let Some(counterpart) = conversation.counterpart_of(local) else {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    "conversation does not involve the local actor, skipping"
                );
                continue;
            };
            let slot = slots.entry(counterpart).or_default();
            // A set error means the slot is already resolved; keep it.
            let _ = slot.set(conversation.id);
        }
    }

    /// The resolved conversation with `counterpart`, if any.
    #[must_use]
    pub fn lookup(&self, counterpart: ActorId) -> Option<ConversationId> {
        self.slots
            .lock()
            .get(&counterpart)
            .and_then(|slot| slot.get().copied())
    }

    /// The counterpart owning `conversation`, if it is resolved here.
    #[must_use]
    pub fn counterpart_of(&self, conversation: ConversationId) -> Option<ActorId> {
        self.slots
            .lock()
            .iter()
            .find(|(_, slot)| slot.get() == Some(&conversation))
            .map(|(actor, _)| *actor)
    }

    /// Number of resolved conversations. Pending counterparts are not counted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Whether no conversation is resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
