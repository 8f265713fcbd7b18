//! Event channel to the messaging server.
//!
//! A single persistent WebSocket carries the JSON event frames defined in
//! [`journal_chat_proto::codec`]. It is owned by a supervisor task spawned
//! with [`Connector::spawn`]; callers talk to it through a cloneable
//! [`ConnectorHandle`] and observe it through a stream of
//! [`TransportEvent`]s.
//!
//! - [`connector`]: the supervisor, its dial/retry loop and the handle

pub mod connector;

use std::time::Duration;

use journal_chat_proto::codec::CodecError;
use journal_chat_proto::event::ServerEvent;

pub use connector::{Connector, ConnectorHandle};

/// Settings of the event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Automatic reconnect attempts after a failure, before giving up.
    pub reconnect_attempts: u32,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,
    /// Upper bound on a single dial.
    pub connect_timeout: Duration,
    /// How long a request waits for its ack reply.
    pub request_timeout: Duration,
    /// Capacity of the [`TransportEvent`] channel.
    pub channel_capacity: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3000/ws".to_string(),
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            channel_capacity: 256,
        }
    }
}

/// Lifecycle signals and inbound events of the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The socket is open and the local actor is identified on it.
    Connected,
    /// The socket closed. Outbound operations now fail fast.
    Disconnected,
    /// A dial attempt failed.
    ConnectError(String),
    /// Waiting before reconnect attempt `attempt` of `max_attempts`.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Configured bound.
        max_attempts: u32,
    },
    /// Every automatic attempt failed. The connector stays down until
    /// [`ConnectorHandle::reconnect`] is called.
    ReconnectFailed,
    /// A validated server event.
    Event(ServerEvent),
    /// An inbound frame failed validation and was dropped.
    Malformed(String),
}

/// Errors from outbound operations on the channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// No open connection; nothing was sent.
    #[error("not connected to the messaging server")]
    Unavailable,

    /// The connection closed before the ack reply arrived.
    #[error("connection closed before the reply arrived")]
    ReplyDropped,

    /// The ack reply did not arrive in time.
    #[error("request timed out")]
    Timeout,

    /// The frame could not be encoded, or the reply could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
