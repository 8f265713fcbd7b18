// Test-specific lint overrides: property tests use unwrap freely.
#![allow(clippy::unwrap_used)]

//! Property-based tests of the frame codec.
//!
//! Uses proptest to verify:
//! 1. Arbitrary text never makes either decoder panic.
//! 2. A known event name with an arbitrary payload decodes or is rejected
//!    as malformed, never as anything else.
//! 3. Snapshots keep every valid entry and count every invalid one.
//! 4. Message text survives the client → server hop unchanged.

use journal_chat_proto::actor::ActorId;
use journal_chat_proto::codec::{self, CodecError, ServerFrame};
use journal_chat_proto::event::{ClientEvent, SendMessage, ServerEvent, names};
use proptest::prelude::*;
use serde_json::{Value, json};

/// Strategy for arbitrary JSON values, a few levels deep.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        any::<f64>().prop_map(|f| json!(f)),
        ".{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z]{1,10}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strategy for one snapshot entry: a valid message or one missing a
/// required field. Returns the entry and whether it is valid.
fn arb_entry() -> impl Strategy<Value = (Value, bool)> {
    (1u64..1000, 1u64..50, 1u64..50, ".{0,20}", 0usize..5).prop_map(|(id, from, to, text, hole)| {
        let mut entry = json!({
            "id": id,
            "fromId": from,
            "toId": to,
            "message": text,
            "isRead": false,
            "createdAt": "2025-03-01T10:00:00Z",
            "articleUserChatId": 7,
        });
        let missing = ["id", "fromId", "toId", "createdAt"].get(hole).copied();
        if let (Some(field), Some(obj)) = (missing, entry.as_object_mut()) {
            obj.remove(field);
        }
        (entry, missing.is_none())
    })
}

const SERVER_EVENTS: [&str; 4] = [
    names::LOAD_PREVIOUS_MESSAGES,
    names::NEW_MESSAGE,
    names::MESSAGE_SENT,
    names::MESSAGE_READ,
];

proptest! {
    #[test]
    fn arbitrary_text_never_panics(text in ".{0,256}") {
        let _ = codec::decode_server_frame(&text);
        let _ = codec::decode_client_frame(&text);
    }

    #[test]
    fn known_event_with_arbitrary_payload_is_ok_or_malformed(
        event in 0usize..SERVER_EVENTS.len(),
        data in arb_json(),
    ) {
        let text = json!({ "event": SERVER_EVENTS[event], "data": data }).to_string();
        match codec::decode_server_frame(&text) {
            Ok(ServerFrame::Event(_)) | Err(CodecError::Malformed { .. }) => {}
            other => prop_assert!(false, "unexpected result {:?}", other),
        }
    }

    #[test]
    fn snapshot_keeps_valid_entries_and_counts_the_rest(
        entries in prop::collection::vec(arb_entry(), 0..30)
    ) {
        let valid = entries.iter().filter(|(_, ok)| *ok).count();
        let data: Vec<Value> = entries.into_iter().map(|(v, _)| v).collect();
        let total = data.len();
        let text = json!({ "event": names::LOAD_PREVIOUS_MESSAGES, "data": data }).to_string();

        let ServerFrame::Event(ServerEvent::LoadPreviousMessages { messages, dropped }) =
            codec::decode_server_frame(&text).unwrap()
        else {
            panic!("expected a snapshot");
        };
        prop_assert_eq!(messages.len(), valid);
        prop_assert_eq!(dropped, total - valid);
    }

    #[test]
    fn message_text_survives_the_client_hop(body in "\\PC{0,200}", from in 1u64..100, to in 1u64..100) {
        let event = ClientEvent::SendMessage(SendMessage {
            from_id: ActorId::new(from),
            to_id: ActorId::new(to),
            message: body.clone(),
        });
        let text = codec::encode_client_event(&event, None).unwrap();
        let frame = codec::decode_client_frame(&text).unwrap();
        prop_assert_eq!(frame.event, event);
        prop_assert_eq!(frame.ack, None);
    }
}
