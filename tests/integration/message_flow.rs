// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::future_not_send,
    clippy::redundant_pub_crate
)]

//! Sending, receiving, acknowledgement and read receipts end to end.

mod common;

use std::time::Duration;

use common::{ADMIN, AUTHOR, AUTHOR2, DevServer, ready, wait_for};
use journal_chat::client::ChatUpdate;
use journal_chat::error::ChatError;
use journal_chat::transport::ConnectorConfig;
use journal_chat_proto::message::Message;

fn acknowledged(update: &ChatUpdate) -> Option<Message> {
    match update {
        ChatUpdate::MessageAcknowledged(m) => Some(m.clone()),
        _ => None,
    }
}

fn received(update: &ChatUpdate) -> Option<Message> {
    match update {
        ChatUpdate::MessageReceived(m) => Some(m.clone()),
        _ => None,
    }
}

#[tokio::test]
async fn message_reaches_counterpart_and_ack_replaces_pending() {
    let server = DevServer::start().await;
    let author = server.login("author-token").await;
    let admin = server.login("admin-token").await;
    ready(&author).await;
    ready(&admin).await;

    let local_id = author.send_message(ADMIN, "  salom  ").unwrap();
    let pending = author.pending_for(ADMIN);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].local_id, local_id);
    assert_eq!(pending[0].body, "salom");
    assert_eq!(author.stored_messages(), 0);

    let ack = acknowledged(&wait_for(&author, |u| acknowledged(u).is_some()).await).unwrap();
    assert_eq!(ack.body, "salom");
    assert_eq!(ack.sender, AUTHOR);
    assert!(author.pending_for(ADMIN).is_empty());
    assert_eq!(author.messages_with(ADMIN), vec![ack.clone()]);

    let incoming = received(&wait_for(&admin, |u| received(u).is_some()).await).unwrap();
    assert_eq!(incoming, ack);
    assert_eq!(admin.view(|v| v.unread_count(AUTHOR)), 1);
    assert_eq!(admin.view(|v| v.total_unread()), 1);
    let rows = admin.view(|v| {
        v.conversation_list()
            .iter()
            .map(|r| r.actor.id)
            .collect::<Vec<_>>()
    });
    assert_eq!(rows[0], AUTHOR);
}

#[tokio::test]
async fn echoed_copy_is_stored_once_and_keeps_the_next_pending_send() {
    let server = DevServer::start().await;
    server.state.set_echo_to_sender(true);
    let author = server.login("author-token").await;
    ready(&author).await;

    author.send_message(ADMIN, "ok").unwrap();
    author.send_message(ADMIN, "ok").unwrap();
    assert_eq!(author.pending_for(ADMIN).len(), 2);

    // Each send comes back as message_sent and then new_message.
    let first = acknowledged(&wait_for(&author, |u| acknowledged(u).is_some()).await).unwrap();
    assert_eq!(author.pending_for(ADMIN).len(), 1);
    wait_for(&author, |u| *u == ChatUpdate::Duplicate(first.id)).await;
    assert_eq!(author.stored_messages(), 1);
    assert_eq!(author.pending_for(ADMIN).len(), 1);

    let second = acknowledged(&wait_for(&author, |u| acknowledged(u).is_some()).await).unwrap();
    assert_ne!(second.id, first.id);
    wait_for(&author, |u| *u == ChatUpdate::Duplicate(second.id)).await;
    assert_eq!(author.stored_messages(), 2);
    assert!(author.pending_for(ADMIN).is_empty());
}

#[tokio::test]
async fn redelivered_messages_are_stored_once() {
    let server = DevServer::start().await;
    let phone = server.login("author-token").await;
    let laptop = server.login("author-token").await;
    ready(&phone).await;
    ready(&laptop).await;

    phone.send_message(ADMIN, "from the phone").unwrap();
    let ack = acknowledged(&wait_for(&phone, |u| acknowledged(u).is_some()).await).unwrap();

    // The other device sees its own actor's message as acknowledged too.
    let mirrored =
        acknowledged(&wait_for(&laptop, |u| acknowledged(u).is_some()).await).unwrap();
    assert_eq!(mirrored.id, ack.id);

    // The history snapshot carries the same message again.
    laptop.open_conversation(ADMIN).await.unwrap();
    let merged = wait_for(&laptop, |u| matches!(u, ChatUpdate::HistoryLoaded { .. })).await;
    assert_eq!(
        merged,
        ChatUpdate::HistoryLoaded {
            added: 0,
            dropped: 0
        }
    );
    assert_eq!(laptop.stored_messages(), 1);
    assert_eq!(laptop.messages_with(ADMIN).len(), 1);
}

#[tokio::test]
async fn blank_message_is_rejected_before_sending() {
    let server = DevServer::start().await;
    let author = server.login("author-token").await;
    ready(&author).await;

    assert!(matches!(
        author.send_message(ADMIN, "   \n"),
        Err(ChatError::EmptyMessage)
    ));
    assert!(author.pending_for(ADMIN).is_empty());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.state.history_of(AUTHOR).await.is_empty());
}

#[tokio::test]
async fn send_while_disconnected_fails_without_a_trace() {
    let server = DevServer::start().await;
    let unreachable = ConnectorConfig {
        url: "ws://127.0.0.1:1/ws".to_string(),
        reconnect_attempts: 0,
        ..server.connector_config()
    };
    let author = server
        .login_with("author-token", unreachable, Duration::from_secs(60))
        .await;
    assert!(!author.is_connected());

    assert!(matches!(
        author.send_message(ADMIN, "hello?"),
        Err(ChatError::TransportUnavailable)
    ));
    assert!(author.pending_for(ADMIN).is_empty());
    assert_eq!(author.stored_messages(), 0);
    assert!(matches!(author.mark_conversation_read(ADMIN), Ok(0)));
}

#[tokio::test]
async fn late_ack_for_a_conversation_no_longer_open_is_stored() {
    let server = DevServer::start().await;
    let author = server.login("author-token").await;
    ready(&author).await;

    author.open_conversation(ADMIN).await.unwrap();
    author.send_message(ADMIN, "first").unwrap();
    author.open_conversation(AUTHOR2).await.unwrap();
    assert_eq!(author.selected(), Some(AUTHOR2));

    let ack = acknowledged(&wait_for(&author, |u| acknowledged(u).is_some()).await).unwrap();
    assert_eq!(ack.recipient, ADMIN);
    assert_eq!(author.messages_with(ADMIN), vec![ack]);
    assert!(author.messages_with(AUTHOR2).is_empty());
}

#[tokio::test]
async fn message_in_the_open_conversation_is_marked_read() {
    let server = DevServer::start().await;
    let author = server.login("author-token").await;
    let admin = server.login("admin-token").await;
    ready(&author).await;
    ready(&admin).await;
    admin.open_conversation(AUTHOR).await.unwrap();
    wait_for(&admin, |u| matches!(u, ChatUpdate::HistoryLoaded { .. })).await;

    author.send_message(ADMIN, "please review").unwrap();
    let incoming = received(&wait_for(&admin, |u| received(u).is_some()).await).unwrap();
    assert!(!incoming.read);

    let read = wait_for(&admin, |u| matches!(u, ChatUpdate::MessageRead(_))).await;
    assert_eq!(read, ChatUpdate::MessageRead(incoming.id));
    assert_eq!(admin.view(|v| v.unread_count(AUTHOR)), 0);

    // The sender learns about it too.
    wait_for(&author, |u| *u == ChatUpdate::MessageRead(incoming.id)).await;
    assert!(author.messages_with(ADMIN)[0].read);
}

#[tokio::test]
async fn message_elsewhere_stays_unread_until_marked() {
    let server = DevServer::start().await;
    let author = server.login("author-token").await;
    let admin = server.login("admin-token").await;
    ready(&author).await;
    ready(&admin).await;
    admin.open_conversation(AUTHOR2).await.unwrap();

    author.send_message(ADMIN, "one").unwrap();
    author.send_message(ADMIN, "two").unwrap();
    received(&wait_for(&admin, |u| received(u).is_some()).await).unwrap();
    received(&wait_for(&admin, |u| received(u).is_some()).await).unwrap();
    assert_eq!(admin.view(|v| v.unread_count(AUTHOR)), 2);

    // Local flags change only once the server confirms.
    assert_eq!(admin.mark_conversation_read(AUTHOR).unwrap(), 2);
    assert_eq!(admin.view(|v| v.unread_count(AUTHOR)), 2);

    wait_for(&admin, |u| matches!(u, ChatUpdate::MessageRead(_))).await;
    wait_for(&admin, |u| matches!(u, ChatUpdate::MessageRead(_))).await;
    assert_eq!(admin.view(|v| v.unread_count(AUTHOR)), 0);
    assert!(
        server
            .state
            .history_between(AUTHOR, ADMIN)
            .await
            .iter()
            .all(|m| m.read)
    );
}
