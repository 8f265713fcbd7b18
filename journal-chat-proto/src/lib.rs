//! Shared protocol definitions for the journal chat REST and event-channel contract.

pub mod actor;
pub mod codec;
pub mod event;
pub mod message;
pub mod rest;
