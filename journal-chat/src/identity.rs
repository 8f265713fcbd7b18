//! Identity resolution: the local actor and the directory of counterparts.

use journal_chat_proto::actor::{Actor, ActorId};

use crate::api::{ApiError, ChatApi};

/// Resolves identities through a [`ChatApi`]. Performs no retries.
pub struct IdentityResolver<'a, A: ChatApi> {
    api: &'a A,
}

impl<'a, A: ChatApi> IdentityResolver<'a, A> {
    /// Creates a resolver over `api`.
    pub const fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Returns the local actor.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthenticated`] when the credential is missing or
    /// rejected; the caller must redirect to login.
    pub async fn fetch_self(&self) -> Result<Actor, ApiError> {
        self.api.fetch_self().await
    }

    /// Returns every addressable actor except `local`.
    ///
    /// # Errors
    ///
    /// Propagates the [`ApiError`] of the directory request.
    pub async fn fetch_directory(&self, local: ActorId) -> Result<Directory, ApiError> {
        let actors = self.api.fetch_directory().await?;
        Ok(Directory::new(
            actors.into_iter().filter(|a| a.id != local).collect(),
        ))
    }
}

/// The addressable counterparts of a session.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    actors: Vec<Actor>,
}

impl Directory {
    /// Creates a directory, dropping repeated ids (first occurrence wins).
    #[must_use]
    pub fn new(actors: Vec<Actor>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let actors = actors.into_iter().filter(|a| seen.insert(a.id)).collect();
        Self { actors }
    }

    /// Looks up an actor by id.
    #[must_use]
    pub fn get(&self, id: ActorId) -> Option<&Actor> {
        self.actors.iter().find(|a| a.id == id)
    }

    /// All actors, in server order.
    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    /// Number of actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Whether there is no counterpart at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Actors whose full name or username contains `query`, ignoring case.
    /// A blank query matches everyone.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Actor> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.actors.iter().collect();
        }
        self.actors
            .iter()
            .filter(|a| {
                let full = format!("{} {}", a.first_name, a.last_name).to_lowercase();
                full.contains(&needle) || a.username.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Splits the directory into (staff, regular users).
    #[must_use]
    pub fn partition_by_role(&self) -> (Vec<&Actor>, Vec<&Actor>) {
        self.actors.iter().partition(|a| a.role.is_staff())
    }
}
