// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::future_not_send,
    clippy::redundant_pub_crate
)]

//! Session start-up and teardown against the dev server.
//!
//! Covers login (identity and directory resolution), rejected credentials,
//! registry seeding from existing conversations, single-flight conversation
//! creation, history loading on open, and logout.

mod common;

use std::time::Duration;

use common::{ADMIN, AUTHOR, AUTHOR2, DevServer, SUPERADMIN, ready, wait_for};
use journal_chat::client::{ChatClient, ChatUpdate};
use journal_chat::config::ClientConfig;
use journal_chat::error::ChatError;
use journal_chat::session::Credential;
use journal_chat::store::LogState;
use journal_chat_proto::actor::{ActorId, Role};

#[tokio::test]
async fn start_resolves_identity_and_connects() {
    let server = DevServer::start().await;
    let config = ClientConfig {
        api_base: server.api_base(),
        socket_url: server.socket_url(),
        token: Some(Credential::new("author-token")),
        poll_interval: Duration::from_secs(60),
        ..ClientConfig::default()
    };

    let client = ChatClient::start(&config, server.api("author-token"))
        .await
        .unwrap();
    assert_eq!(client.local().id, AUTHOR);
    assert_eq!(client.local().role, Role::User);

    let directory = client.session().directory();
    assert_eq!(directory.len(), 3);
    assert!(directory.get(AUTHOR).is_none());
    let (staff, users) = directory.partition_by_role();
    assert_eq!(staff.len(), 2);
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, AUTHOR2);

    wait_for(&client, |u| *u == ChatUpdate::Connected).await;
    assert!(client.is_connected());
    server.wait_for_connections(AUTHOR, 1).await;

    client.logout();
    server.wait_for_connections(AUTHOR, 0).await;
}

#[tokio::test]
async fn rejected_token_is_unauthenticated() {
    let server = DevServer::start().await;
    let config = ClientConfig {
        api_base: server.api_base(),
        socket_url: server.socket_url(),
        ..ClientConfig::default()
    };

    let result = ChatClient::start(&config, server.api("not-a-token")).await;
    assert!(matches!(result, Err(ChatError::Unauthenticated)));

    let result = ChatClient::start(&config, server.api("   ")).await;
    assert!(matches!(result, Err(ChatError::Unauthenticated)));
    assert_eq!(server.state.connection_count(AUTHOR).await, 0);
}

#[tokio::test]
async fn concurrent_opens_share_one_conversation() {
    let server = DevServer::start().await;
    let client = server.login("author-token").await;

    let (a, b) = tokio::join!(
        client.open_conversation(ADMIN),
        client.open_conversation(ADMIN)
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a, b);
    assert_eq!(client.registry().len(), 1);
    assert_eq!(client.registry().counterpart_of(a), Some(ADMIN));
    assert_eq!(server.state.conversations_of(AUTHOR).await.len(), 1);
    assert_eq!(client.selected(), Some(ADMIN));
}

#[tokio::test]
async fn registry_is_seeded_from_existing_conversations() {
    let server = DevServer::start().await;
    let (existing, _) = server.state.open_conversation(AUTHOR, SUPERADMIN).await;

    let superadmin = server.login("superadmin-token").await;
    assert_eq!(superadmin.registry().lookup(AUTHOR), Some(existing.id));

    // Opening again reuses the seeded id without creating anything.
    let opened = superadmin.open_conversation(AUTHOR).await.unwrap();
    assert_eq!(opened, existing.id);
    assert_eq!(server.state.conversations_of(SUPERADMIN).await.len(), 1);
}

#[tokio::test]
async fn opening_an_unknown_actor_fails_and_leaves_the_registry_empty() {
    let server = DevServer::start().await;
    let client = server.login("author-token").await;

    let err = client.open_conversation(ActorId::new(99)).await.unwrap_err();
    assert!(matches!(err, ChatError::RequestFailed(_)));
    assert!(client.registry().is_empty());
    assert_eq!(client.selected(), None);
}

#[tokio::test]
async fn opening_loads_the_pair_history() {
    let server = DevServer::start().await;
    server
        .state
        .store_message(ADMIN, AUTHOR, "welcome".into())
        .await;
    server
        .state
        .store_message(AUTHOR, AUTHOR2, "other pair".into())
        .await;

    let client = server.login("author-token").await;
    let first = wait_for(&client, |u| matches!(u, ChatUpdate::HistoryLoaded { .. })).await;
    assert_eq!(
        first,
        ChatUpdate::HistoryLoaded {
            added: 2,
            dropped: 0
        }
    );

    let conversation = client.open_conversation(ADMIN).await.unwrap();
    // Already ready from the join snapshot; opening never downgrades it.
    assert_eq!(client.conversation_state(ADMIN), LogState::Ready);
    let again = wait_for(&client, |u| matches!(u, ChatUpdate::HistoryLoaded { .. })).await;
    assert_eq!(
        again,
        ChatUpdate::HistoryLoaded {
            added: 0,
            dropped: 0
        }
    );

    let messages = client.messages_with(ADMIN);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body, "welcome");
    assert_eq!(messages[0].conversation, conversation);
    assert_eq!(client.view(|v| v.unread_count(ADMIN)), 1);
}

#[tokio::test]
async fn new_conversation_moves_from_loading_to_ready() {
    let server = DevServer::start().await;
    let client = server.login("author2-token").await;
    ready(&client).await;

    assert_eq!(client.conversation_state(ADMIN), LogState::Uninitialized);
    client.open_conversation(ADMIN).await.unwrap();
    assert_eq!(client.conversation_state(ADMIN), LogState::Loading);

    wait_for(&client, |u| matches!(u, ChatUpdate::HistoryLoaded { .. })).await;
    assert_eq!(client.conversation_state(ADMIN), LogState::Ready);
    assert!(client.messages_with(ADMIN).is_empty());
}
