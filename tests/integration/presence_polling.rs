// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::future_not_send,
    clippy::redundant_pub_crate
)]

//! Presence polling against the dev server.
//!
//! Presence is a periodically refreshed snapshot. A refresh that fails
//! leaves the previous snapshot in place rather than marking everyone
//! offline.

mod common;

use std::time::Duration;

use common::{ADMIN, AUTHOR, AUTHOR2, DevServer, ready, wait_for};
use journal_chat::api::HttpApi;
use journal_chat::client::{ChatClient, ChatUpdate};
use journal_chat_proto::actor::ActorId;

const POLL: Duration = Duration::from_millis(200);

/// Drives `client` until its snapshot equals `expected`.
async fn wait_for_online(client: &ChatClient<HttpApi>, expected: &[ActorId]) {
    tokio::time::timeout(common::WAIT, async {
        while client.online() != expected {
            client.next_update().await.expect("update stream ended");
        }
    })
    .await
    .expect("presence never converged");
}

#[tokio::test]
async fn snapshot_follows_connected_actors() {
    let server = DevServer::start().await;
    let author = server
        .login_with("author-token", server.connector_config(), POLL)
        .await;
    let admin = server.login("admin-token").await;
    ready(&admin).await;

    wait_for_online(&author, &[ADMIN, AUTHOR]).await;
    assert!(author.view(|v| v.is_online(ADMIN)));
    assert!(!author.view(|v| v.is_online(AUTHOR2)));
    let rows = author.view(|v| {
        v.conversation_list()
            .iter()
            .filter(|r| r.online)
            .map(|r| r.actor.id)
            .collect::<Vec<_>>()
    });
    assert_eq!(rows, vec![ADMIN]);

    admin.logout();
    server.wait_for_connections(ADMIN, 0).await;
    wait_for_online(&author, &[AUTHOR]).await;
}

#[tokio::test]
async fn failed_refresh_keeps_the_last_known_snapshot() {
    let server = DevServer::start().await;
    let author = server
        .login_with("author-token", server.connector_config(), POLL)
        .await;
    let admin = server.login("admin-token").await;
    ready(&admin).await;
    wait_for_online(&author, &[ADMIN, AUTHOR]).await;

    server.state.set_presence_replies(false);
    admin.logout();
    server.wait_for_connections(ADMIN, 0).await;

    wait_for(&author, |u| *u == ChatUpdate::PresenceRefreshFailed).await;
    wait_for(&author, |u| *u == ChatUpdate::PresenceRefreshFailed).await;
    assert_eq!(author.online(), vec![ADMIN, AUTHOR]);
    assert!(author.view(|v| v.is_online(ADMIN)));

    server.state.set_presence_replies(true);
    wait_for(&author, |u| *u == ChatUpdate::PresenceRefreshed { changed: true }).await;
    assert_eq!(author.online(), vec![AUTHOR]);
}

#[tokio::test]
async fn refresh_on_demand_does_not_wait_for_the_interval() {
    let server = DevServer::start().await;
    let author = server
        .login_with("author-token", server.connector_config(), Duration::from_secs(3600))
        .await;
    ready(&author).await;
    wait_for_online(&author, &[AUTHOR]).await;

    let admin = server.login("admin-token").await;
    ready(&admin).await;
    server.wait_for_connections(ADMIN, 1).await;

    author.refresh_presence();
    wait_for(&author, |u| *u == ChatUpdate::PresenceRefreshed { changed: true }).await;
    assert_eq!(author.online(), vec![ADMIN, AUTHOR]);
}
