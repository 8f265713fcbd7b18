//! Shared dev server state: seeded accounts, conversations, messages and
//! the per-actor connection registry.
//!
//! Everything lives in memory and is lost on restart. Message and
//! conversation ids are assigned monotonically, starting at 1.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use axum::extract::ws::Message as WsMessage;
use chrono::Utc;
use journal_chat_proto::actor::{Actor, ActorId, Role};
use journal_chat_proto::message::{Conversation, ConversationId, Message, MessageId};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock, mpsc};

/// Sender half of one WebSocket writer task.
pub type ConnectionSender = mpsc::UnboundedSender<WsMessage>;

/// Identifies one registered connection of an actor.
pub type ConnectionId = u64;

/// A seeded account: the bearer token that logs in as `actor`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedUser {
    /// Bearer token accepted for this account.
    pub token: String,
    /// The account itself.
    #[serde(flatten)]
    pub actor: Actor,
}

impl SeedUser {
    /// Builds a seed entry.
    pub fn new(token: impl Into<String>, actor: Actor) -> Self {
        Self {
            token: token.into(),
            actor,
        }
    }
}

/// Accounts used when no seed file is given.
#[must_use]
pub fn default_seed() -> Vec<SeedUser> {
    let account = |id: u64, first: &str, last: &str, username: &str, role: Role| Actor {
        id: ActorId::new(id),
        first_name: first.to_string(),
        last_name: last.to_string(),
        username: username.to_string(),
        role,
        email: Some(format!("{username}@journal.test")),
        image: None,
    };
    vec![
        SeedUser::new(
            "superadmin-token",
            account(1, "Nodira", "Rashidova", "superadmin", Role::SuperAdmin),
        ),
        SeedUser::new(
            "admin-token",
            account(2, "Dilshod", "Karimov", "admin", Role::Admin),
        ),
        SeedUser::new(
            "author-token",
            account(3, "Aziza", "Yusupova", "aziza", Role::User),
        ),
        SeedUser::new(
            "author2-token",
            account(4, "Bekzod", "Tursunov", "bekzod", Role::User),
        ),
    ]
}

/// Conversations and messages.
#[derive(Debug, Default)]
struct Ledger {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    next_conversation: u64,
    next_message: u64,
}

impl Ledger {
    fn find_pair(&self, a: ActorId, b: ActorId) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|c| (c.from_id == a && c.to_id == b) || (c.from_id == b && c.to_id == a))
    }

    fn open(&mut self, from: ActorId, to: ActorId) -> (Conversation, bool) {
        if let Some(existing) = self.find_pair(from, to) {
            return (existing.clone(), false);
        }
        self.next_conversation += 1;
        let now = Utc::now();
        let conversation = Conversation {
            id: ConversationId::new(self.next_conversation),
            from_id: from,
            to_id: to,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.conversations.push(conversation.clone());
        (conversation, true)
    }
}

/// Shared state of a running dev server.
pub struct DevState {
    tokens: HashMap<String, ActorId>,
    actors: Vec<Actor>,
    ledger: Mutex<Ledger>,
    connections: RwLock<HashMap<ActorId, Vec<(ConnectionId, ConnectionSender)>>>,
    next_connection: AtomicU64,
    presence_replies: AtomicBool,
    echo_to_sender: AtomicBool,
}

impl Default for DevState {
    fn default() -> Self {
        Self::new(default_seed())
    }
}

impl DevState {
    /// Creates a state with the given accounts and no conversations.
    ///
    /// Later entries with an already-seeded id or token are ignored.
    #[must_use]
    pub fn new(seed: Vec<SeedUser>) -> Self {
        let mut tokens = HashMap::new();
        let mut actors: Vec<Actor> = Vec::new();
        for user in seed {
            if tokens.contains_key(&user.token) || actors.iter().any(|a| a.id == user.actor.id) {
                tracing::warn!(actor_id = %user.actor.id, "duplicate seed entry ignored");
                continue;
            }
            tokens.insert(user.token, user.actor.id);
            actors.push(user.actor);
        }
        Self {
            tokens,
            actors,
            ledger: Mutex::new(Ledger::default()),
            connections: RwLock::new(HashMap::new()),
            next_connection: AtomicU64::new(1),
            presence_replies: AtomicBool::new(true),
            echo_to_sender: AtomicBool::new(false),
        }
    }

    /// The account owning `token`, if any.
    #[must_use]
    pub fn authenticate(&self, token: &str) -> Option<&Actor> {
        let id = self.tokens.get(token.trim())?;
        self.actor(*id)
    }

    /// Looks up a seeded account.
    #[must_use]
    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == id)
    }

    /// Every seeded account.
    #[must_use]
    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    /// Returns the conversation between `from` and `to`, creating it if
    /// needed. The flag tells whether it was created.
    pub async fn open_conversation(&self, from: ActorId, to: ActorId) -> (Conversation, bool) {
        self.ledger.lock().await.open(from, to)
    }

    /// Conversations `actor` takes part in, newest first.
    pub async fn conversations_of(&self, actor: ActorId) -> Vec<Conversation> {
        let ledger = self.ledger.lock().await;
        let mut list: Vec<Conversation> = ledger
            .conversations
            .iter()
            .filter(|c| c.counterpart_of(actor).is_some())
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        list
    }

    /// Stores a new message, creating the conversation on first contact.
    pub async fn store_message(&self, from: ActorId, to: ActorId, body: String) -> Message {
        let mut ledger = self.ledger.lock().await;
        let (conversation, _) = ledger.open(from, to);
        ledger.next_message += 1;
        let message = Message {
            id: MessageId::new(ledger.next_message),
            sender: from,
            recipient: to,
            body,
            created_at: Utc::now(),
            read: false,
            conversation: conversation.id,
        };
        ledger.messages.push(message.clone());
        message
    }

    /// Marks `id` read on behalf of `reader`.
    ///
    /// Only the recipient can mark a message read. Returns the updated
    /// message, or `None` if it is unknown or `reader` is not its recipient.
    pub async fn mark_read(&self, id: MessageId, reader: ActorId) -> Option<Message> {
        let mut ledger = self.ledger.lock().await;
        let message = ledger
            .messages
            .iter_mut()
            .find(|m| m.id == id && m.recipient == reader)?;
        message.read = true;
        Some(message.clone())
    }

    /// Every message sent or received by `actor`, oldest first.
    pub async fn history_of(&self, actor: ActorId) -> Vec<Message> {
        let ledger = self.ledger.lock().await;
        ledger
            .messages
            .iter()
            .filter(|m| m.sender == actor || m.recipient == actor)
            .cloned()
            .collect()
    }

    /// Messages exchanged between `a` and `b`, oldest first.
    pub async fn history_between(&self, a: ActorId, b: ActorId) -> Vec<Message> {
        let ledger = self.ledger.lock().await;
        ledger
            .messages
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect()
    }

    /// Registers a connection for `actor`. An actor may hold several.
    pub async fn register(&self, actor: ActorId, sender: ConnectionSender) -> ConnectionId {
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let mut conns = self.connections.write().await;
        conns.entry(actor).or_default().push((id, sender));
        id
    }

    /// Removes one connection of `actor`.
    pub async fn unregister(&self, actor: ActorId, connection: ConnectionId) {
        let mut conns = self.connections.write().await;
        if let Some(list) = conns.get_mut(&actor) {
            list.retain(|(id, _)| *id != connection);
            if list.is_empty() {
                conns.remove(&actor);
            }
        }
    }

    /// Queues `msg` on every connection of `actor` except `skip`.
    pub async fn send_to_actor(&self, actor: ActorId, msg: &WsMessage, skip: Option<ConnectionId>) {
        let conns = self.connections.read().await;
        let Some(list) = conns.get(&actor) else {
            return;
        };
        for (id, sender) in list {
            if Some(*id) != skip {
                let _ = sender.send(msg.clone());
            }
        }
    }

    /// Actors holding at least one connection, by id.
    pub async fn online(&self) -> Vec<ActorId> {
        let conns = self.connections.read().await;
        let mut ids: Vec<ActorId> = conns.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of open connections of `actor`.
    pub async fn connection_count(&self, actor: ActorId) -> usize {
        self.connections
            .read()
            .await
            .get(&actor)
            .map_or(0, Vec::len)
    }

    /// Whether `get_online_users` requests are answered.
    #[must_use]
    pub fn presence_replies(&self) -> bool {
        self.presence_replies.load(Ordering::Relaxed)
    }

    /// Stops or resumes answering `get_online_users`. Unanswered requests
    /// time out on the client.
    pub fn set_presence_replies(&self, enabled: bool) {
        tracing::info!(enabled, "presence replies toggled");
        self.presence_replies.store(enabled, Ordering::Relaxed);
    }

    /// Whether `new_message` also goes back to the sending connection.
    #[must_use]
    pub fn echo_to_sender(&self) -> bool {
        self.echo_to_sender.load(Ordering::Relaxed)
    }

    /// Makes the sending connection receive its own `new_message` after
    /// `message_sent`, as a broadcasting backend does.
    pub fn set_echo_to_sender(&self, enabled: bool) {
        tracing::info!(enabled, "sender echo toggled");
        self.echo_to_sender.store(enabled, Ordering::Relaxed);
    }

    /// Sends a close frame on every connection.
    ///
    /// Each writer task forwards the close frame, which ends the client's
    /// reader. Useful for shutdown and for exercising reconnects.
    pub async fn close_all_connections(&self) {
        let conns = self.connections.read().await;
        for (actor, list) in conns.iter() {
            for (_, sender) in list {
                tracing::info!(actor_id = %actor, "sending close frame");
                let _ = sender.send(WsMessage::Close(None));
            }
        }
    }
}
