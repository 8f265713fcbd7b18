//! `journal-chat`: conversation client for the journal platform's
//! author/admin chat.
//!
//! Turns the raw event channel and REST calls into a consistent,
//! role-aware view of one-to-one conversations. [`client::ChatClient`] is
//! the entry point; the other modules are usable on their own.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod outbox;
pub mod presence;
pub mod registry;
pub mod session;
pub mod store;
pub mod transport;
pub mod view;
