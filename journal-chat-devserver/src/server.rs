//! HTTP routes and the WebSocket event handler.
//!
//! REST endpoints live under `/api` and authenticate with a bearer token
//! from the seed. The event channel lives at `/ws`; a connection is bound
//! to an actor by its first `join_user` frame.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use journal_chat_proto::actor::{Actor, ActorId};
use journal_chat_proto::codec;
use journal_chat_proto::event::{
    ClientEvent, LoadMessages, MarkAsRead, OnlineUsers, SendMessage, ServerEvent,
};
use journal_chat_proto::message::Conversation;
use journal_chat_proto::rest::{ApiEnvelope, OpenConversationRequest, PageQuery};
use tokio::sync::mpsc;

use crate::state::{ConnectionId, ConnectionSender, DevState};

/// Result of [`start_server`]: the bound address and the serve task.
pub type ServerHandle = (SocketAddr, tokio::task::JoinHandle<()>);

/// A failed REST call.
#[derive(Debug, thiserror::Error)]
pub enum ApiFailure {
    /// Missing or unknown bearer token.
    #[error("unauthorized")]
    Unauthorized,
    /// The request names something that does not exist or is not allowed.
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        let body = serde_json::json!({
            "statusCode": status.as_u16(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiEnvelope<T>>, ApiFailure>;

/// Builds the router serving `state`.
pub fn router(state: Arc<DevState>) -> Router {
    Router::new()
        .route("/api/user/me", get(fetch_self))
        .route("/api/user", get(fetch_directory))
        .route(
            "/api/article-user-chat",
            get(list_conversations).post(open_conversation),
        )
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Starts a server with the built-in accounts.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<ServerHandle, Box<dyn std::error::Error + Send + Sync>> {
    start_server_with_state(addr, Arc::new(DevState::default())).await
}

/// Starts a server over an existing [`DevState`].
///
/// Passing the same state to a second server keeps all accounts and
/// messages, which is how tests simulate a server restart.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<DevState>,
) -> Result<ServerHandle, Box<dyn std::error::Error + Send + Sync>> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "dev server error");
        }
    });

    Ok((bound_addr, handle))
}

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

fn authenticate<'a>(state: &'a DevState, headers: &HeaderMap) -> Result<&'a Actor, ApiFailure> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiFailure::Unauthorized)?;
    state.authenticate(token).ok_or(ApiFailure::Unauthorized)
}

async fn fetch_self(State(state): State<Arc<DevState>>, headers: HeaderMap) -> ApiResult<Actor> {
    let me = authenticate(&state, &headers)?;
    Ok(Json(ApiEnvelope::ok(me.clone())))
}

async fn fetch_directory(
    State(state): State<Arc<DevState>>,
    headers: HeaderMap,
) -> ApiResult<Vec<Actor>> {
    authenticate(&state, &headers)?;
    Ok(Json(ApiEnvelope::ok(state.actors().to_vec())))
}

async fn open_conversation(
    State(state): State<Arc<DevState>>,
    headers: HeaderMap,
    Json(body): Json<OpenConversationRequest>,
) -> ApiResult<Conversation> {
    let me = authenticate(&state, &headers)?.id;
    if body.to_id == me {
        return Err(ApiFailure::BadRequest("cannot chat with yourself".into()));
    }
    if state.actor(body.to_id).is_none() {
        return Err(ApiFailure::BadRequest(format!("user {} not found", body.to_id)));
    }
    let (conversation, created) = state.open_conversation(me, body.to_id).await;
    tracing::info!(
        actor_id = %me,
        counterpart = %body.to_id,
        conversation_id = %conversation.id,
        created,
        "conversation opened"
    );
    Ok(Json(ApiEnvelope::ok(conversation)))
}

async fn list_conversations(
    State(state): State<Arc<DevState>>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<Conversation>> {
    let me = authenticate(&state, &headers)?.id;
    let mut list = state.conversations_of(me).await;
    if page.sort_order.eq_ignore_ascii_case("asc") {
        list.reverse();
    }
    let limit = usize::try_from(page.limit.max(1)).unwrap_or(usize::MAX);
    let skip = usize::try_from(page.page.max(1) - 1)
        .unwrap_or(usize::MAX)
        .saturating_mul(limit);
    let list = list.into_iter().skip(skip).take(limit).collect();
    Ok(Json(ApiEnvelope::ok(list)))
}

// ---------------------------------------------------------------------------
// Event channel
// ---------------------------------------------------------------------------

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<DevState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One joined connection.
struct Session {
    actor: ActorId,
    connection: ConnectionId,
    reply: ConnectionSender,
}

impl Session {
    fn send(&self, event: &ServerEvent) {
        if let Some(frame) = encode(event) {
            let _ = self.reply.send(frame);
        }
    }
}

fn encode(event: &ServerEvent) -> Option<WsMessage> {
    match codec::encode_server_event(event) {
        Ok(text) => Some(WsMessage::Text(text.into())),
        Err(e) => {
            tracing::error!(event = event.name(), error = %e, "failed to encode event");
            None
        }
    }
}

/// Handles an upgraded WebSocket connection.
///
/// 1. Wait for `join_user`.
/// 2. Register the connection and send the actor's history snapshot.
/// 3. Process events until either side closes.
/// 4. Unregister.
pub async fn handle_socket(socket: WebSocket, state: Arc<DevState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Some(actor) = wait_for_join(&mut ws_receiver, &state).await else {
        tracing::warn!("connection closed before join_user");
        return;
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let connection = state.register(actor, tx.clone()).await;
    tracing::info!(actor_id = %actor, connection, "actor joined");

    let snapshot = ServerEvent::LoadPreviousMessages {
        messages: state.history_of(actor).await,
        dropped: 0,
    };
    if let Some(frame) = encode(&snapshot)
        && let Err(e) = ws_sender.send(frame).await
    {
        tracing::warn!(actor_id = %actor, error = %e, "failed to send history snapshot");
        state.unregister(actor, connection).await;
        return;
    }

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(actor_id = %actor, "WebSocket write failed");
                break;
            }
        }
    });

    let session = Session {
        actor,
        connection,
        reply: tx,
    };
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                WsMessage::Text(text) => handle_text(&session, text.as_str(), &reader_state).await,
                WsMessage::Close(_) => {
                    tracing::info!(actor_id = %session.actor, "received close frame");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => write_task.abort(),
        _ = &mut write_task => read_task.abort(),
    }

    state.unregister(actor, connection).await;
    tracing::info!(actor_id = %actor, connection, "connection closed");
}

/// Reads frames until a `join_user` naming a seeded actor arrives.
///
/// Other events before it are ignored. Returns `None` if the socket closes
/// or the actor is unknown.
async fn wait_for_join(
    receiver: &mut (impl StreamExt<Item = Result<WsMessage, axum::Error>> + Unpin),
    state: &DevState,
) -> Option<ActorId> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            WsMessage::Text(text) => match codec::decode_client_frame(text.as_str()) {
                Ok(frame) => match frame.event {
                    ClientEvent::JoinUser(join) if state.actor(join.user_id).is_some() => {
                        return Some(join.user_id);
                    }
                    ClientEvent::JoinUser(join) => {
                        tracing::warn!(user_id = %join.user_id, "join_user for unknown actor");
                        return None;
                    }
                    other => {
                        tracing::warn!(event = other.name(), "event before join_user ignored");
                    }
                },
                Err(e) => tracing::warn!(error = %e, "undecodable frame before join_user"),
            },
            WsMessage::Close(_) => return None,
            _ => {}
        }
    }
    None
}

async fn handle_text(session: &Session, text: &str, state: &Arc<DevState>) {
    let frame = match codec::decode_client_frame(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(actor_id = %session.actor, error = %e, "malformed client frame");
            return;
        }
    };

    match frame.event {
        ClientEvent::JoinUser(join) => {
            if join.user_id != session.actor {
                tracing::warn!(
                    actor_id = %session.actor,
                    user_id = %join.user_id,
                    "connection already joined as another actor"
                );
            }
        }
        ClientEvent::SendMessage(send) => handle_send(session, send, state).await,
        ClientEvent::MarkAsRead(mark) => handle_mark_read(session, mark, state).await,
        ClientEvent::GetOnlineUsers => {
            let Some(ack) = frame.ack else {
                tracing::debug!("get_online_users without ack id ignored");
                return;
            };
            if !state.presence_replies() {
                tracing::debug!(ack, "presence replies disabled, request left unanswered");
                return;
            }
            let reply = OnlineUsers {
                online_users: state.online().await,
            };
            match codec::encode_ack(ack, &reply) {
                Ok(text) => {
                    let _ = session.reply.send(WsMessage::Text(text.into()));
                }
                Err(e) => tracing::error!(error = %e, "failed to encode ack"),
            }
        }
        ClientEvent::LoadMessages(LoadMessages { to_id, .. }) => {
            let messages = state.history_between(session.actor, to_id).await;
            tracing::debug!(actor_id = %session.actor, counterpart = %to_id, count = messages.len(), "history requested");
            session.send(&ServerEvent::LoadPreviousMessages {
                messages,
                dropped: 0,
            });
        }
    }
}

async fn handle_send(session: &Session, send: SendMessage, state: &Arc<DevState>) {
    if send.from_id != session.actor {
        tracing::warn!(
            actor_id = %session.actor,
            claimed = %send.from_id,
            "send_message sender overridden with the joined actor"
        );
    }
    if state.actor(send.to_id).is_none() {
        tracing::warn!(to = %send.to_id, "send_message to unknown actor dropped");
        return;
    }
    if send.message.trim().is_empty() {
        tracing::warn!(actor_id = %session.actor, "empty send_message dropped");
        return;
    }

    let message = state
        .store_message(session.actor, send.to_id, send.message)
        .await;
    tracing::debug!(message_id = %message.id, from = %message.sender, to = %message.recipient, "message stored");

    session.send(&ServerEvent::MessageSent(message.clone()));
    let recipient = message.recipient;
    if let Some(frame) = encode(&ServerEvent::NewMessage(message)) {
        if recipient != session.actor {
            state.send_to_actor(recipient, &frame, None).await;
        }
        let skip = (!state.echo_to_sender()).then_some(session.connection);
        state.send_to_actor(session.actor, &frame, skip).await;
    }
}

async fn handle_mark_read(session: &Session, mark: MarkAsRead, state: &Arc<DevState>) {
    if mark.to_id != session.actor {
        tracing::warn!(
            actor_id = %session.actor,
            claimed = %mark.to_id,
            "mark_as_read reader overridden with the joined actor"
        );
    }
    let Some(message) = state.mark_read(mark.message_id, session.actor).await else {
        tracing::debug!(message_id = %mark.message_id, "mark_as_read ignored");
        return;
    };
    if let Some(frame) = encode(&ServerEvent::MessageRead(message.clone())) {
        state.send_to_actor(message.sender, &frame, None).await;
        if message.recipient != message.sender {
            state.send_to_actor(message.recipient, &frame, None).await;
        }
    }
}
