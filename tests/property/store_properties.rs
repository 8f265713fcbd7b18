// Test-specific lint overrides: property tests use unwrap freely and cast
// small generated indices.
#![allow(
    clippy::unwrap_used,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap
)]

//! Property-based tests of the message store and its derived views.
//!
//! Uses proptest to verify, for arbitrary delivery sequences:
//! 1. Each message id is stored once, whichever path delivered it.
//! 2. A stored read flag is the OR of every delivered copy.
//! 3. Conversation listings are ordered by creation time, then id.
//! 4. The final state does not depend on delivery order.
//! 5. `mark_read` is idempotent.
//! 6. Unread counts match a direct recount.

use std::collections::{BTreeMap, HashMap};

use chrono::{TimeZone, Utc};
use journal_chat::identity::Directory;
use journal_chat::presence::PresenceTracker;
use journal_chat::store::MessageStore;
use journal_chat::view::ConversationView;
use journal_chat_proto::actor::{Actor, ActorId, Role};
use journal_chat_proto::message::{ConversationId, Message, MessageId};
use proptest::prelude::*;

const LOCAL: u64 = 1;

/// One delivery of a message: which one, with which read flag, and whether
/// it came alone or inside a snapshot.
#[derive(Debug, Clone)]
struct Delivery {
    index: usize,
    read: bool,
    in_snapshot: bool,
}

fn conversation_of(a: u64, b: u64) -> ConversationId {
    ConversationId::new(a.min(b) * 10 + a.max(b))
}

/// Strategy for a message between two distinct actors in `1..=4`. The
/// coarse timestamps force ties that only the id breaks.
fn arb_message() -> impl Strategy<Value = (u64, u64, i64, String)> {
    (1u64..=4, 1u64..=3, 0i64..20, "[a-z]{0,8}").prop_map(|(from, step, secs, body)| {
        let to = (from + step - 1) % 4 + 1;
        (from, to, secs, body)
    })
}

/// Strategy for a set of messages with unique ids plus a delivery schedule
/// that may repeat any of them.
fn arb_scenario() -> impl Strategy<Value = (Vec<Message>, Vec<Delivery>)> {
    prop::collection::vec(arb_message(), 1..20).prop_flat_map(|drafts| {
        let messages: Vec<Message> = drafts
            .into_iter()
            .enumerate()
            .map(|(i, (from, to, secs, body))| Message {
                id: MessageId::new(i as u64 + 1),
                sender: ActorId::new(from),
                recipient: ActorId::new(to),
                body,
                created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
                read: false,
                conversation: conversation_of(from, to),
            })
            .collect();
        let n = messages.len();
        let delivery = (0..n, any::<bool>(), any::<bool>()).prop_map(|(index, read, in_snapshot)| {
            Delivery {
                index,
                read,
                in_snapshot,
            }
        });
        (Just(messages), prop::collection::vec(delivery, 0..60))
    })
}

/// Applies `deliveries`, batching consecutive snapshot deliveries.
fn apply(messages: &[Message], deliveries: &[Delivery]) -> MessageStore {
    let mut store = MessageStore::new();
    let mut batch = Vec::new();
    for d in deliveries {
        let mut copy = messages[d.index].clone();
        copy.read = d.read;
        if d.in_snapshot {
            batch.push(copy);
        } else {
            if !batch.is_empty() {
                store.ingest(std::mem::take(&mut batch));
            }
            store.append(copy);
        }
    }
    if !batch.is_empty() {
        store.ingest(batch);
    }
    store
}

/// Expected read flag per delivered id.
fn expected_flags(messages: &[Message], deliveries: &[Delivery]) -> HashMap<MessageId, bool> {
    let mut flags = HashMap::new();
    for d in deliveries {
        let flag = flags.entry(messages[d.index].id).or_insert(false);
        *flag |= d.read;
    }
    flags
}

fn snapshot(store: &MessageStore) -> BTreeMap<MessageId, Message> {
    store.iter().map(|m| (m.id, m.clone())).collect()
}

fn directory() -> Directory {
    Directory::new(
        (2..=4)
            .map(|id| Actor {
                id: ActorId::new(id),
                first_name: String::new(),
                last_name: String::new(),
                username: format!("user{id}"),
                role: Role::User,
                email: None,
                image: None,
            })
            .collect(),
    )
}

proptest! {
    #[test]
    fn each_id_is_stored_once_with_ored_read_flag((messages, deliveries) in arb_scenario()) {
        let store = apply(&messages, &deliveries);
        let expected = expected_flags(&messages, &deliveries);

        prop_assert_eq!(store.len(), expected.len());
        for (id, read) in &expected {
            let stored = store.get(*id).unwrap();
            prop_assert_eq!(stored.read, *read);
        }
    }

    #[test]
    fn conversations_are_ordered_by_time_then_id((messages, deliveries) in arb_scenario()) {
        let store = apply(&messages, &deliveries);
        let mut listed = 0;
        for conversation in store.conversation_ids().collect::<Vec<_>>() {
            let log = store.filter_by_conversation(conversation);
            prop_assert!(log.iter().all(|m| m.conversation == conversation));
            prop_assert!(log.windows(2).all(|w| w[0].order_key() < w[1].order_key()));
            listed += log.len();
        }
        prop_assert_eq!(listed, store.len());
    }

    #[test]
    fn delivery_order_does_not_matter(
        (messages, in_order, shuffled) in arb_scenario().prop_flat_map(|(m, d)| {
            let shuffled = Just(d.clone()).prop_shuffle();
            (Just(m), Just(d), shuffled)
        })
    ) {
        let a = apply(&messages, &in_order);
        let b = apply(&messages, &shuffled);
        prop_assert_eq!(snapshot(&a), snapshot(&b));
    }

    #[test]
    fn mark_read_is_idempotent((messages, deliveries) in arb_scenario(), pick in 0usize..20) {
        let mut store = apply(&messages, &deliveries);
        let id = MessageId::new((pick % messages.len()) as u64 + 1);

        store.mark_read(id);
        let once = snapshot(&store);
        prop_assert!(!store.mark_read(id));
        prop_assert_eq!(snapshot(&store), once);
        if let Some(m) = store.get(id) {
            prop_assert!(m.read);
        }
    }

    #[test]
    fn unread_count_matches_recount((messages, deliveries) in arb_scenario()) {
        let store = apply(&messages, &deliveries);
        let expected = expected_flags(&messages, &deliveries);
        let directory = directory();
        let presence = PresenceTracker::new();
        let view = ConversationView::new(ActorId::new(LOCAL), &directory, &store, &presence);

        let mut total = 0;
        for actor in 2..=4u64 {
            let recount = messages
                .iter()
                .filter(|m| m.sender.get() == actor && m.recipient.get() == LOCAL)
                .filter(|m| expected.get(&m.id) == Some(&false))
                .count();
            prop_assert_eq!(view.unread_count(ActorId::new(actor)), recount);
            total += recount;
        }
        prop_assert_eq!(view.total_unread(), total);
    }
}
