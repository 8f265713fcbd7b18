//! In-memory development server for the journal chat.
//!
//! Speaks the same REST and event-channel contract as the platform
//! backend, closely enough to drive the conversation client end to end.
//! Used by the integration tests and for local demos.

pub mod config;
pub mod server;
pub mod state;
