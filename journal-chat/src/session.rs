//! Session context: the credential, the local actor and the directory.
//!
//! Replaces ambient global state. A [`SessionContext`] is created at login
//! with [`SessionContext::establish`] and dropped at logout.

use std::fmt;

use chrono::{DateTime, Utc};
use journal_chat_proto::actor::Actor;

use crate::api::ChatApi;
use crate::error::ChatError;
use crate::identity::{Directory, IdentityResolver};

/// A bearer credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token for attaching to a request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the token is blank (treated as missing).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Identity state of one logged-in session. Immutable once established.
#[derive(Debug, Clone)]
pub struct SessionContext {
    local: Actor,
    directory: Directory,
    established_at: DateTime<Utc>,
}

impl SessionContext {
    /// Resolves the local actor and the directory of counterparts.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Unauthenticated`] if the credential is missing
    /// or rejected, and [`ChatError::RequestFailed`] for other failures.
    pub async fn establish<A: ChatApi>(api: &A) -> Result<Self, ChatError> {
        let resolver = IdentityResolver::new(api);
        let local = resolver.fetch_self().await?;
        let directory = resolver.fetch_directory(local.id).await?;
        tracing::info!(
            actor_id = %local.id,
            role = %local.role,
            directory_size = directory.len(),
            "session established"
        );
        Ok(Self {
            local,
            directory,
            established_at: Utc::now(),
        })
    }

    /// Builds a context from already-resolved parts.
    #[must_use]
    pub fn from_parts(local: Actor, directory: Directory) -> Self {
        Self {
            local,
            directory,
            established_at: Utc::now(),
        }
    }

    /// The local actor.
    #[must_use]
    pub const fn local(&self) -> &Actor {
        &self.local
    }

    /// Addressable counterparts (never includes the local actor).
    #[must_use]
    pub const fn directory(&self) -> &Directory {
        &self.directory
    }

    /// When the session was established.
    #[must_use]
    pub const fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }
}
