//! Supervisor task owning the WebSocket to the messaging server.
//!
//! The supervisor dials, identifies the local actor, then pumps frames
//! in both directions until the socket drops. It then retries with a fixed
//! delay, up to the configured number of attempts, and reports
//! [`TransportEvent::ReconnectFailed`] once they are exhausted.
//!
//! Outbound operations never queue: while no socket is open they fail
//! with [`TransportError::Unavailable`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use journal_chat_proto::actor::ActorId;
use journal_chat_proto::codec::{self, ServerFrame};
use journal_chat_proto::event::{ClientEvent, JoinUser, OnlineUsers, ServerEvent, names};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{ConnectorConfig, TransportError, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Requests to the supervisor from its handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Reconnect,
    Shutdown,
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ended {
    Lost,
    Reconnect,
    Shutdown,
}

/// State shared between the supervisor and every handle.
#[derive(Debug, Default)]
struct Shared {
    connected: AtomicBool,
    /// Writer queue of the current connection; `None` while disconnected.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    acks: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    next_ack: AtomicU64,
}

impl Shared {
    fn attach(&self, writer: mpsc::UnboundedSender<String>) {
        *self.outbound.lock() = Some(writer);
        self.connected.store(true, Ordering::Release);
    }

    /// Marks the channel down and fails every outstanding request.
    fn detach(&self) {
        self.connected.store(false, Ordering::Release);
        self.outbound.lock().take();
        let dropped = {
            let mut acks = self.acks.lock();
            let n = acks.len();
            acks.clear();
            n
        };
        if dropped > 0 {
            tracing::debug!(dropped, "outstanding requests failed by disconnect");
        }
    }

    fn send_text(&self, text: String) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::Unavailable);
        }
        let outbound = self.outbound.lock();
        let writer = outbound.as_ref().ok_or(TransportError::Unavailable)?;
        writer.send(text).map_err(|_| TransportError::Unavailable)
    }

    fn resolve_ack(&self, ack: u64, data: Value) {
        match self.acks.lock().remove(&ack) {
            // The requester may have timed out; nothing to do then.
            Some(reply) => {
                let _ = reply.send(data);
            }
            None => tracing::debug!(ack, "ack reply for unknown request"),
        }
    }
}

/// Cloneable handle to a running connector.
#[derive(Debug, Clone)]
pub struct ConnectorHandle {
    shared: Arc<Shared>,
    control: mpsc::UnboundedSender<Control>,
    request_timeout: Duration,
}

impl ConnectorHandle {
    /// Whether a socket is open and identified.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Sends a fire-and-forget event.
    ///
    /// # Errors
    ///
    /// [`TransportError::Unavailable`] while disconnected; the event is
    /// dropped, not queued.
    pub fn emit(&self, event: &ClientEvent) -> Result<(), TransportError> {
        let text = codec::encode_client_event(event, None)?;
        self.shared.send_text(text).inspect_err(|_| {
            tracing::debug!(event = event.name(), "emit while disconnected");
        })
    }

    /// Sends an event expecting an ack reply and decodes the reply as `T`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Unavailable`] while disconnected.
    /// - [`TransportError::ReplyDropped`] if the connection closes first.
    /// - [`TransportError::Timeout`] if no reply arrives in time.
    /// - [`TransportError::Codec`] if the reply does not decode as `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        event: &ClientEvent,
    ) -> Result<T, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Unavailable);
        }
        let ack = self.shared.next_ack.fetch_add(1, Ordering::Relaxed);
        let text = codec::encode_client_event(event, Some(ack))?;

        let (tx, rx) = oneshot::channel();
        self.shared.acks.lock().insert(ack, tx);
        if let Err(e) = self.shared.send_text(text) {
            self.shared.acks.lock().remove(&ack);
            return Err(e);
        }

        let data = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(data)) => data,
            Ok(Err(_)) => return Err(TransportError::ReplyDropped),
            Err(_) => {
                self.shared.acks.lock().remove(&ack);
                tracing::debug!(event = event.name(), ack, "request timed out");
                return Err(TransportError::Timeout);
            }
        };
        Ok(codec::decode_ack_payload(event.name(), data)?)
    }

    /// Asks the server which actors are currently reachable.
    ///
    /// # Errors
    ///
    /// Same as [`Self::request`].
    pub async fn online_users(&self) -> Result<Vec<ActorId>, TransportError> {
        let reply: OnlineUsers = self.request(&ClientEvent::GetOnlineUsers).await?;
        Ok(reply.online_users)
    }

    /// Drops the current connection, if any, and dials again right away
    /// with a fresh attempt budget. This is the manual action after
    /// [`TransportEvent::ReconnectFailed`].
    pub fn reconnect(&self) {
        tracing::info!("manual reconnect requested");
        let _ = self.control.send(Control::Reconnect);
    }

    /// Closes the socket and stops the supervisor.
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }
}

/// Spawns connector supervisors.
pub struct Connector;

impl Connector {
    /// Starts a supervisor that connects to `config.url` and identifies as
    /// `actor` on every connection.
    ///
    /// Returns the handle and the event stream. The stream ends when the
    /// supervisor stops.
    #[must_use]
    pub fn spawn(
        config: ConnectorConfig,
        actor: ActorId,
    ) -> (ConnectorHandle, mpsc::Receiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());

        let handle = ConnectorHandle {
            shared: Arc::clone(&shared),
            control: control_tx,
            request_timeout: config.request_timeout,
        };
        let supervisor = Supervisor {
            config,
            actor,
            shared,
            events: events_tx,
            control: control_rx,
        };
        tokio::spawn(supervisor.run());
        (handle, events_rx)
    }
}

struct Supervisor {
    config: ConnectorConfig,
    actor: ActorId,
    shared: Arc<Shared>,
    events: mpsc::Sender<TransportEvent>,
    control: mpsc::UnboundedReceiver<Control>,
}

impl Supervisor {
    async fn run(mut self) {
        tracing::info!(url = %self.config.url, actor_id = %self.actor, "connector started");
        // 0 = first dial of a cycle; n > 0 = n-th retry.
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                if attempt > self.config.reconnect_attempts {
                    tracing::warn!(
                        attempts = self.config.reconnect_attempts,
                        "reconnect attempts exhausted"
                    );
                    if !self.emit(TransportEvent::ReconnectFailed).await {
                        break;
                    }
                    match self.control.recv().await {
                        Some(Control::Reconnect) => {
                            attempt = 0;
                            continue;
                        }
                        Some(Control::Shutdown) | None => break,
                    }
                }

                let reconnecting = TransportEvent::Reconnecting {
                    attempt,
                    max_attempts: self.config.reconnect_attempts,
                };
                if !self.emit(reconnecting).await {
                    break;
                }
                tokio::select! {
                    () = tokio::time::sleep(self.config.reconnect_delay) => {}
                    ctrl = self.control.recv() => match ctrl {
                        Some(Control::Reconnect) => attempt = 0,
                        Some(Control::Shutdown) | None => break,
                    },
                }
            }

            match self.dial().await {
                Ok(ws) => match self.run_connection(ws).await {
                    Ended::Shutdown => break,
                    Ended::Lost => attempt = 1,
                    Ended::Reconnect => attempt = 0,
                },
                Err(reason) => {
                    tracing::warn!(url = %self.config.url, attempt, reason = %reason, "connect failed");
                    if !self.emit(TransportEvent::ConnectError(reason)).await {
                        break;
                    }
                    attempt += 1;
                }
            }
        }
        self.shared.detach();
        tracing::info!("connector stopped");
    }

    /// Sends an event to the consumer; `false` once it is gone.
    async fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    async fn dial(&self) -> Result<WsStream, String> {
        let (ws, _response) = tokio::time::timeout(
            self.config.connect_timeout,
            connect_async(self.config.url.as_str()),
        )
        .await
        .map_err(|_| "connect timed out".to_string())?
        .map_err(|e| e.to_string())?;
        Ok(ws)
    }

    /// Identifies, then pumps frames until the socket ends or a control
    /// request arrives.
    async fn run_connection(&mut self, ws: WsStream) -> Ended {
        let (mut sink, mut stream) = ws.split();

        let identify = ClientEvent::JoinUser(JoinUser {
            user_id: self.actor,
        });
        let sent = match codec::encode_client_event(&identify, None) {
            Ok(text) => sink.send(Message::Text(text.into())).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(reason) = sent {
            tracing::warn!(reason = %reason, "identify failed");
            return if self.emit(TransportEvent::ConnectError(reason)).await {
                Ended::Lost
            } else {
                Ended::Shutdown
            };
        }

        let (writer, mut outbound) = mpsc::unbounded_channel::<String>();
        self.shared.attach(writer);
        tracing::info!(actor_id = %self.actor, "connected and identified");
        if !self.emit(TransportEvent::Connected).await {
            self.shared.detach();
            return Ended::Shutdown;
        }

        let ended = loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !self.dispatch(text.as_str()).await {
                            break Ended::Shutdown;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("server closed the connection");
                        break Ended::Lost;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::warn!("binary frame ignored");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(err = %e, "read error");
                        break Ended::Lost;
                    }
                },
                Some(text) = outbound.recv() => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        tracing::warn!(err = %e, "write error");
                        break Ended::Lost;
                    }
                }
                ctrl = self.control.recv() => match ctrl {
                    Some(Control::Reconnect) => break Ended::Reconnect,
                    Some(Control::Shutdown) | None => break Ended::Shutdown,
                },
            }
        };

        self.shared.detach();
        if ended != Ended::Lost {
            let _ = sink.send(Message::Close(None)).await;
        }
        tracing::info!(?ended, "disconnected");
        if !self.emit(TransportEvent::Disconnected).await {
            return Ended::Shutdown;
        }
        ended
    }

    /// Routes one inbound text frame; `false` once the consumer is gone.
    async fn dispatch(&self, text: &str) -> bool {
        match codec::decode_server_frame(text) {
            Ok(ServerFrame::Event(event)) => {
                if let ServerEvent::LoadPreviousMessages { messages, dropped } = &event {
                    if *dropped > 0 {
                        tracing::warn!(
                            event = names::LOAD_PREVIOUS_MESSAGES,
                            dropped,
                            kept = messages.len(),
                            "malformed snapshot entries dropped"
                        );
                    }
                }
                self.emit(TransportEvent::Event(event)).await
            }
            Ok(ServerFrame::Ack { ack, data }) => {
                self.shared.resolve_ack(ack, data);
                true
            }
            Err(e) => {
                tracing::warn!(err = %e, "malformed frame, skipping");
                self.emit(TransportEvent::Malformed(e.to_string())).await
            }
        }
    }
}
