// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::future_not_send,
    clippy::redundant_pub_crate
)]

//! Connection loss and recovery.
//!
//! A dropped event channel is redialled with a fixed delay, a bounded number
//! of times. Every new connection identifies again before anything else, and
//! the snapshot sent in reply fills the gap. Once retries are exhausted only
//! a manual reconnect brings the channel back.

mod common;

use common::{ADMIN, AUTHOR, DevServer, ready, wait_for};
use journal_chat::client::ChatUpdate;
use journal_chat::error::ChatError;

#[tokio::test]
async fn dropped_connection_reidentifies_and_fills_the_gap() {
    let server = DevServer::start().await;
    let author = server.login("author-token").await;
    ready(&author).await;
    server.wait_for_connections(AUTHOR, 1).await;

    server.state.close_all_connections().await;
    wait_for(&author, |u| *u == ChatUpdate::Disconnected).await;
    assert!(!author.is_connected());

    // Arrives while the author is offline.
    let missed = server
        .state
        .store_message(ADMIN, AUTHOR, "while you were away".into())
        .await;

    let attempt = wait_for(&author, |u| matches!(u, ChatUpdate::Reconnecting { .. })).await;
    assert_eq!(
        attempt,
        ChatUpdate::Reconnecting {
            attempt: 1,
            max_attempts: 3
        }
    );
    wait_for(&author, |u| *u == ChatUpdate::Connected).await;
    let snapshot = wait_for(&author, |u| matches!(u, ChatUpdate::HistoryLoaded { .. })).await;
    assert_eq!(
        snapshot,
        ChatUpdate::HistoryLoaded {
            added: 1,
            dropped: 0
        }
    );
    assert_eq!(author.messages_with(ADMIN)[0].id, missed.id);

    // The server knows the connection again, so sends route normally.
    server.wait_for_connections(AUTHOR, 1).await;
    author.send_message(ADMIN, "back").unwrap();
    wait_for(&author, |u| matches!(u, ChatUpdate::MessageAcknowledged(_))).await;
}

#[tokio::test]
async fn retries_are_bounded_and_manual_reconnect_recovers() {
    let server = DevServer::start().await;
    let author = server.login("author-token").await;
    ready(&author).await;

    let DevServer {
        addr,
        state,
        handle,
    } = server;
    handle.abort();
    let _ = handle.await;
    state.close_all_connections().await;

    wait_for(&author, |u| *u == ChatUpdate::Disconnected).await;
    let mut attempts = Vec::new();
    loop {
        match wait_for(&author, |u| {
            matches!(
                u,
                ChatUpdate::Reconnecting { .. } | ChatUpdate::ReconnectFailed
            )
        })
        .await
        {
            ChatUpdate::Reconnecting { attempt, .. } => attempts.push(attempt),
            _ => break,
        }
    }
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(matches!(
        author.send_message(ADMIN, "anyone?"),
        Err(ChatError::TransportUnavailable)
    ));

    let restarted = DevServer::start_on(&addr.to_string(), state).await;
    author.reconnect();
    wait_for(&author, |u| *u == ChatUpdate::Connected).await;
    restarted.wait_for_connections(AUTHOR, 1).await;
    assert!(author.is_connected());
}

#[tokio::test]
async fn manual_reconnect_while_connected_starts_a_fresh_connection() {
    let server = DevServer::start().await;
    let author = server.login("author-token").await;
    ready(&author).await;

    author.reconnect();
    wait_for(&author, |u| *u == ChatUpdate::Disconnected).await;
    wait_for(&author, |u| *u == ChatUpdate::Connected).await;
    wait_for(&author, |u| matches!(u, ChatUpdate::HistoryLoaded { .. })).await;
    server.wait_for_connections(AUTHOR, 1).await;
}
