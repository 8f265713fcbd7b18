//! JSON frame codec for the event channel.
//!
//! Every WebSocket text frame is one JSON object:
//!
//! ```text
//! { "event": "<name>", "data": <payload>, "ack": <id>? }   event
//! { "ack": <id>, "data": <payload> }                        ack reply
//! ```
//!
//! Decoding validates each frame against the schema of its event and
//! rejects anything else with a [`CodecError`]. Callers treat those errors
//! as malformed events: logged and dropped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{
    ClientEvent, JoinUser, LoadMessages, MarkAsRead, SendMessage, ServerEvent, names,
};
use crate::message::{Message, WireMessage};

/// Error type for frame encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame is not valid JSON or does not have the frame shape.
    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame carries neither an event name nor an ack id.
    #[error("frame has neither `event` nor `ack`")]
    MissingEvent,

    /// The event name is not part of the vocabulary.
    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    /// The payload does not match the event's schema.
    #[error("malformed `{event}` payload: {reason}")]
    Malformed {
        /// The event whose payload was rejected.
        event: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// A decoded frame received by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// A pushed event.
    Event(ServerEvent),
    /// A reply to a client request carrying an ack id.
    Ack {
        /// The id the client attached to its request.
        ack: u64,
        /// Raw reply payload, decoded by the requester.
        data: Value,
    },
}

/// A decoded frame received by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFrame {
    /// The event.
    pub event: ClientEvent,
    /// Ack id to echo in the reply, if the client expects one.
    pub ack: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ack: Option<u64>,
}

/// Encodes a client event, optionally requesting an ack reply.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the payload cannot be serialized.
pub fn encode_client_event(event: &ClientEvent, ack: Option<u64>) -> Result<String, CodecError> {
    let data = match event {
        ClientEvent::JoinUser(p) => serde_json::to_value(p)?,
        ClientEvent::SendMessage(p) => serde_json::to_value(p)?,
        ClientEvent::MarkAsRead(p) => serde_json::to_value(p)?,
        ClientEvent::GetOnlineUsers => Value::Object(serde_json::Map::new()),
        ClientEvent::LoadMessages(p) => serde_json::to_value(p)?,
    };
    let frame = RawFrame {
        event: Some(event.name().to_string()),
        data,
        ack,
    };
    Ok(serde_json::to_string(&frame)?)
}

/// Decodes a frame sent by the client.
///
/// # Errors
///
/// Returns a [`CodecError`] for invalid JSON, a missing or unknown event
/// name, or a payload that does not match the event's schema.
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, CodecError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    let name = raw.event.ok_or(CodecError::MissingEvent)?;
    let event = match name.as_str() {
        names::JOIN_USER => ClientEvent::JoinUser(payload::<JoinUser>(&name, raw.data)?),
        names::SEND_MESSAGE => ClientEvent::SendMessage(payload::<SendMessage>(&name, raw.data)?),
        names::MARK_AS_READ => ClientEvent::MarkAsRead(payload::<MarkAsRead>(&name, raw.data)?),
        names::GET_ONLINE_USERS => ClientEvent::GetOnlineUsers,
        names::LOAD_MESSAGES => {
            ClientEvent::LoadMessages(payload::<LoadMessages>(&name, raw.data)?)
        }
        _ => return Err(CodecError::UnknownEvent(name)),
    };
    Ok(ClientFrame {
        event,
        ack: raw.ack,
    })
}

/// Encodes a server event.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the payload cannot be serialized.
pub fn encode_server_event(event: &ServerEvent) -> Result<String, CodecError> {
    let data = match event {
        ServerEvent::LoadPreviousMessages { messages, .. } => {
            let wire: Vec<WireMessage> = messages.iter().map(WireMessage::from).collect();
            serde_json::to_value(wire)?
        }
        ServerEvent::NewMessage(m) | ServerEvent::MessageSent(m) | ServerEvent::MessageRead(m) => {
            serde_json::to_value(WireMessage::from(m))?
        }
    };
    let frame = RawFrame {
        event: Some(event.name().to_string()),
        data,
        ack: None,
    };
    Ok(serde_json::to_string(&frame)?)
}

/// Encodes an ack reply to the request carrying `ack`.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if the payload cannot be serialized.
pub fn encode_ack<T: Serialize>(ack: u64, data: &T) -> Result<String, CodecError> {
    let frame = RawFrame {
        event: None,
        data: serde_json::to_value(data)?,
        ack: Some(ack),
    };
    Ok(serde_json::to_string(&frame)?)
}

/// Decodes a frame sent by the server.
///
/// Snapshot entries that fail validation are dropped individually and
/// counted in [`ServerEvent::LoadPreviousMessages::dropped`]; the rest of
/// the snapshot is kept.
///
/// # Errors
///
/// Returns a [`CodecError`] for invalid JSON, a missing or unknown event
/// name, or a payload that does not match the event's schema.
pub fn decode_server_frame(text: &str) -> Result<ServerFrame, CodecError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    let Some(name) = raw.event else {
        return match raw.ack {
            Some(ack) => Ok(ServerFrame::Ack {
                ack,
                data: raw.data,
            }),
            None => Err(CodecError::MissingEvent),
        };
    };

    let event = match name.as_str() {
        names::LOAD_PREVIOUS_MESSAGES => decode_snapshot(&name, raw.data)?,
        names::NEW_MESSAGE => ServerEvent::NewMessage(message(&name, raw.data)?),
        names::MESSAGE_SENT => ServerEvent::MessageSent(message(&name, raw.data)?),
        names::MESSAGE_READ => ServerEvent::MessageRead(message(&name, raw.data)?),
        _ => return Err(CodecError::UnknownEvent(name)),
    };
    Ok(ServerFrame::Event(event))
}

/// Decodes the payload of an ack reply.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if `data` does not match `T`.
pub fn decode_ack_payload<T: DeserializeOwned>(request: &str, data: Value) -> Result<T, CodecError> {
    payload(request, data)
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, CodecError> {
    serde_json::from_value(data).map_err(|e| CodecError::Malformed {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

fn message(event: &str, data: Value) -> Result<Message, CodecError> {
    let wire: WireMessage = payload(event, data)?;
    Message::try_from(wire).map_err(|e| CodecError::Malformed {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

fn decode_snapshot(event: &str, data: Value) -> Result<ServerEvent, CodecError> {
    let Value::Array(entries) = data else {
        return Err(CodecError::Malformed {
            event: event.to_string(),
            reason: "expected an array of messages".to_string(),
        });
    };

    let total = entries.len();
    let messages: Vec<Message> = entries
        .into_iter()
        .filter_map(|entry| message(event, entry).ok())
        .collect();
    Ok(ServerEvent::LoadPreviousMessages {
        dropped: total - messages.len(),
        messages,
    })
}
