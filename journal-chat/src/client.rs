//! The conversation client facade.
//!
//! [`ChatClient`] owns one session: the identity context, the conversation
//! registry, the message store, presence and the outbox overlay. Inbound
//! traffic is applied by [`ChatClient::next_update`], which is the only
//! writer of the store and the presence snapshot. Callers drive it in a
//! loop next to their own input handling.

use std::collections::HashSet;
use std::time::Duration;

use journal_chat_proto::actor::{Actor, ActorId};
use journal_chat_proto::event::{ClientEvent, LoadMessages, MarkAsRead, SendMessage, ServerEvent};
use journal_chat_proto::message::{ConversationId, Message, MessageId};
use parking_lot::RwLock;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::api::ChatApi;
use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::outbox::{Outbox, PendingSend};
use crate::presence::{PresencePoller, PresenceRefresh, PresenceTracker};
use crate::registry::ConversationRegistry;
use crate::session::SessionContext;
use crate::store::{LogState, MessageStore};
use crate::transport::{Connector, ConnectorConfig, ConnectorHandle, TransportEvent};
use crate::view::ConversationView;

/// What a call to [`ChatClient::next_update`] changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatUpdate {
    /// The event channel is up and identified.
    Connected,
    /// The event channel dropped; sending is disabled.
    Disconnected,
    /// A dial attempt failed.
    ConnectError(String),
    /// Waiting before an automatic reconnect attempt.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Configured bound.
        max_attempts: u32,
    },
    /// Automatic reconnects are exhausted; see [`ChatClient::reconnect`].
    ReconnectFailed,
    /// A history snapshot was merged.
    HistoryLoaded {
        /// Messages that were not stored before.
        added: usize,
        /// Snapshot entries rejected as malformed.
        dropped: usize,
    },
    /// A new message from a counterpart was stored.
    MessageReceived(Message),
    /// One of the local actor's messages was acknowledged and stored.
    MessageAcknowledged(Message),
    /// A message already in the store arrived again.
    Duplicate(MessageId),
    /// A message is now read.
    MessageRead(MessageId),
    /// A presence refresh succeeded.
    PresenceRefreshed {
        /// Whether the online set changed.
        changed: bool,
    },
    /// A presence refresh failed; the previous snapshot is kept.
    PresenceRefreshFailed,
    /// An inbound event failed validation and was dropped.
    Malformed(String),
}

/// Mutable session state, written only while applying updates and sends.
#[derive(Debug, Default)]
struct ChatState {
    store: MessageStore,
    presence: PresenceTracker,
    outbox: Outbox,
    selected: Option<ActorId>,
}

impl ChatState {
    /// Applies one server event. Also returns the id of a message that
    /// should get a read receipt, if any.
    fn apply_server_event(
        &mut self,
        event: ServerEvent,
        local: ActorId,
    ) -> (ChatUpdate, Option<MessageId>) {
        match event {
            ServerEvent::LoadPreviousMessages { messages, dropped } => {
                let mut seen = HashSet::new();
                for message in &messages {
                    if self.store.get(message.id).is_none() && seen.insert(message.id) {
                        self.outbox.reconcile_from_history(message, local);
                    }
                }
                let added = self.store.ingest(messages);
                tracing::debug!(added, dropped, total = self.store.len(), "history merged");
                (ChatUpdate::HistoryLoaded { added, dropped }, None)
            }
            ServerEvent::NewMessage(message) | ServerEvent::MessageSent(message) => {
                if !self.store.append(message.clone()) {
                    return (ChatUpdate::Duplicate(message.id), None);
                }
                if message.sender == local {
                    self.outbox.reconcile(&message, local);
                    return (ChatUpdate::MessageAcknowledged(message), None);
                }
                let open = self.selected == Some(message.sender);
                let receipt =
                    (open && message.recipient == local && !message.read).then_some(message.id);
                (ChatUpdate::MessageReceived(message), receipt)
            }
            ServerEvent::MessageRead(mut message) => {
                let id = message.id;
                if self.store.get(id).is_some() {
                    self.store.mark_read(id);
                } else {
                    message.read = true;
                    self.store.append(message);
                }
                (ChatUpdate::MessageRead(id), None)
            }
        }
    }
}

struct Inbox {
    transport: mpsc::Receiver<TransportEvent>,
    presence: mpsc::Receiver<PresenceRefresh>,
}

/// One logged-in chat session.
pub struct ChatClient<A: ChatApi> {
    api: A,
    session: SessionContext,
    registry: ConversationRegistry,
    state: RwLock<ChatState>,
    connector: ConnectorHandle,
    poller: PresencePoller,
    inbox: Mutex<Inbox>,
}

impl<A: ChatApi> ChatClient<A> {
    /// Logs in and starts the event channel and presence polling.
    ///
    /// Resolves the local actor and directory, seeds the registry from the
    /// existing conversations (best effort), then connects.
    ///
    /// # Errors
    ///
    /// [`ChatError::Unauthenticated`] if the credential is rejected and
    /// [`ChatError::RequestFailed`] if the identity calls fail.
    pub async fn start(config: &ClientConfig, api: A) -> Result<Self, ChatError> {
        let session = SessionContext::establish(&api).await?;
        Ok(Self::start_with_session(
            config.connector_config(),
            config.poll_interval,
            api,
            session,
        )
        .await)
    }

    /// Starts a client for an already established session.
    pub async fn start_with_session(
        connector: ConnectorConfig,
        poll_interval: Duration,
        api: A,
        session: SessionContext,
    ) -> Self {
        let registry = ConversationRegistry::new();
        match api.list_conversations().await {
            Ok(conversations) => {
                registry.seed(&conversations, session.local().id);
                tracing::debug!(known = registry.len(), "registry seeded");
            }
            Err(e) => tracing::warn!(err = %e, "could not list conversations, starting empty"),
        }

        let capacity = connector.channel_capacity.max(1);
        let (handle, transport) = Connector::spawn(connector, session.local().id);
        let (presence_tx, presence) = mpsc::channel(capacity);
        let poller = PresencePoller::spawn(handle.clone(), poll_interval, presence_tx);

        Self {
            api,
            session,
            registry,
            state: RwLock::new(ChatState::default()),
            connector: handle,
            poller,
            inbox: Mutex::new(Inbox {
                transport,
                presence,
            }),
        }
    }

    /// The local actor.
    #[must_use]
    pub const fn local(&self) -> &Actor {
        self.session.local()
    }

    /// The session context.
    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    /// The conversation registry.
    #[must_use]
    pub const fn registry(&self) -> &ConversationRegistry {
        &self.registry
    }

    /// Whether the event channel is up. Send controls should be disabled
    /// while this is `false`.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connector.is_connected()
    }

    /// The counterpart of the open conversation, if any.
    #[must_use]
    pub fn selected(&self) -> Option<ActorId> {
        self.state.read().selected
    }

    /// Waits for the next inbound event or presence result and applies it.
    ///
    /// Returns `None` once the connector has stopped.
    pub async fn next_update(&self) -> Option<ChatUpdate> {
        let mut guard = self.inbox.lock().await;
        let inbox = &mut *guard;
        tokio::select! {
            event = inbox.transport.recv() => Some(self.apply_transport(event?)),
            Some(refresh) = inbox.presence.recv() => Some(self.apply_presence(refresh)),
        }
    }

    fn apply_presence(&self, refresh: PresenceRefresh) -> ChatUpdate {
        let ok = refresh.is_ok();
        let changed = self.state.write().presence.apply_refresh(refresh);
        if ok {
            ChatUpdate::PresenceRefreshed { changed }
        } else {
            ChatUpdate::PresenceRefreshFailed
        }
    }

    fn apply_transport(&self, event: TransportEvent) -> ChatUpdate {
        match event {
            TransportEvent::Connected => {
                self.poller.poke();
                ChatUpdate::Connected
            }
            TransportEvent::Disconnected => {
                let dropped = self.state.write().outbox.clear();
                if dropped > 0 {
                    tracing::info!(dropped, "pending sends dropped with the connection");
                }
                ChatUpdate::Disconnected
            }
            TransportEvent::ConnectError(reason) => ChatUpdate::ConnectError(reason),
            TransportEvent::Reconnecting {
                attempt,
                max_attempts,
            } => ChatUpdate::Reconnecting {
                attempt,
                max_attempts,
            },
            TransportEvent::ReconnectFailed => ChatUpdate::ReconnectFailed,
            TransportEvent::Malformed(reason) => ChatUpdate::Malformed(reason),
            TransportEvent::Event(event) => self.apply_server_event(event),
        }
    }

    fn apply_server_event(&self, event: ServerEvent) -> ChatUpdate {
        let (update, receipt) = self.state.write().apply_server_event(event, self.local().id);
        if let Some(message_id) = receipt {
            self.emit_read_receipt(message_id);
        }
        update
    }

    fn emit_read_receipt(&self, message_id: MessageId) {
        let event = ClientEvent::MarkAsRead(MarkAsRead {
            message_id,
            to_id: self.local().id,
        });
        if let Err(e) = self.connector.emit(&event) {
            tracing::debug!(message_id = %message_id, err = %e, "read receipt not sent");
        }
    }

    /// Opens the conversation with `counterpart` and makes it the selected
    /// one, creating it on the server if needed.
    ///
    /// # Errors
    ///
    /// [`ChatError::RequestFailed`] if `counterpart` is not in the
    /// directory or the create request fails; the registry is unchanged.
    pub async fn open_conversation(&self, counterpart: ActorId) -> Result<ConversationId, ChatError> {
        if self.session.directory().get(counterpart).is_none() {
            return Err(ChatError::RequestFailed(format!(
                "actor {counterpart} is not addressable"
            )));
        }
        let conversation = self.registry.open(counterpart, &self.api).await?;
        {
            let mut state = self.state.write();
            state.selected = Some(counterpart);
            state.store.begin_loading(conversation);
        }

        let load = ClientEvent::LoadMessages(LoadMessages {
            from_id: self.local().id,
            to_id: counterpart,
        });
        if let Err(e) = self.connector.emit(&load) {
            // The snapshot sent on the next identify covers it.
            tracing::debug!(err = %e, "history request deferred until reconnect");
        }
        tracing::info!(counterpart = %counterpart, conversation_id = %conversation, "conversation opened");
        Ok(conversation)
    }

    /// Clears the selection. In-flight sends are not cancelled.
    pub fn close_conversation(&self) {
        self.state.write().selected = None;
    }

    /// Sends `body` to `counterpart`.
    ///
    /// The message enters the store only when the server acknowledges it;
    /// until then it is visible through [`Self::pending_for`]. Returns the
    /// local id of the pending entry.
    ///
    /// # Errors
    ///
    /// - [`ChatError::EmptyMessage`] if `body` is blank.
    /// - [`ChatError::TransportUnavailable`] while disconnected; nothing is
    ///   queued.
    pub fn send_message(&self, counterpart: ActorId, body: &str) -> Result<Uuid, ChatError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let event = ClientEvent::SendMessage(SendMessage {
            from_id: self.local().id,
            to_id: counterpart,
            message: body.to_string(),
        });

        // Held across the emit so the acknowledgement cannot be applied
        // before the pending entry exists.
        let mut state = self.state.write();
        self.connector.emit(&event).inspect_err(|e| {
            tracing::warn!(counterpart = %counterpart, err = %e, "send failed");
        })?;
        Ok(state.outbox.push(counterpart, body))
    }

    /// Sends a read receipt for every unread message from `counterpart`.
    ///
    /// Local read flags change only when the server confirms with
    /// `message_read`. Returns how many receipts were sent.
    ///
    /// # Errors
    ///
    /// [`ChatError::TransportUnavailable`] while disconnected.
    pub fn mark_conversation_read(&self, counterpart: ActorId) -> Result<usize, ChatError> {
        let local = self.local().id;
        let unread: Vec<MessageId> = self
            .state
            .read()
            .store
            .iter()
            .filter(|m| m.sender == counterpart && m.recipient == local && !m.read)
            .map(|m| m.id)
            .collect();
        if unread.is_empty() {
            return Ok(0);
        }
        for &message_id in &unread {
            self.connector.emit(&ClientEvent::MarkAsRead(MarkAsRead {
                message_id,
                to_id: local,
            }))?;
        }
        Ok(unread.len())
    }

    /// Asks for a presence refresh now instead of at the next tick.
    pub fn refresh_presence(&self) {
        self.poller.poke();
    }

    /// Runs `f` over a consistent projection of the current state.
    pub fn view<R>(&self, f: impl FnOnce(&ConversationView<'_>) -> R) -> R {
        let state = self.state.read();
        let view = ConversationView::new(
            self.local().id,
            self.session.directory(),
            &state.store,
            &state.presence,
        );
        f(&view)
    }

    /// Stored messages exchanged with `counterpart`, oldest first.
    #[must_use]
    pub fn messages_with(&self, counterpart: ActorId) -> Vec<Message> {
        self.state
            .read()
            .store
            .messages_between(self.local().id, counterpart)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Load state of the conversation with `counterpart`.
    #[must_use]
    pub fn conversation_state(&self, counterpart: ActorId) -> LogState {
        self.registry
            .lookup(counterpart)
            .map_or(LogState::Uninitialized, |id| self.state.read().store.state(id))
    }

    /// Sends to `counterpart` not yet acknowledged, oldest first.
    #[must_use]
    pub fn pending_for(&self, counterpart: ActorId) -> Vec<PendingSend> {
        self.state
            .read()
            .outbox
            .pending_for(counterpart)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Total stored messages.
    #[must_use]
    pub fn stored_messages(&self) -> usize {
        self.state.read().store.len()
    }

    /// Ids of the actors online at the last successful presence refresh.
    #[must_use]
    pub fn online(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.state.read().presence.snapshot().iter().copied().collect();
        ids.sort();
        ids
    }

    /// Drops the current connection and dials again with a fresh attempt
    /// budget.
    pub fn reconnect(&self) {
        self.connector.reconnect();
    }

    /// Ends the session: closes the event channel, stops polling and
    /// discards all session state.
    pub fn logout(self) {
        tracing::info!(actor_id = %self.local().id, "logging out");
        self.connector.shutdown();
    }
}
