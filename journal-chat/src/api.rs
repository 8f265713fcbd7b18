//! Request/response access to the platform REST API.
//!
//! Defines the [`ChatApi`] trait consumed by the identity resolver and the
//! conversation registry, and [`HttpApi`], its reqwest implementation.
//! Nothing here retries; callers decide.

use journal_chat_proto::actor::{Actor, ActorId};
use journal_chat_proto::message::Conversation;
use journal_chat_proto::rest::{ApiEnvelope, OpenConversationRequest, PageQuery};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::session::Credential;

/// Errors from a single REST call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The credential is missing or was rejected (401/403).
    #[error("credential missing or rejected")]
    Unauthenticated,

    /// Network failure, non-success status, or undecodable body.
    #[error("{0}")]
    RequestFailed(String),
}

/// The REST calls the conversation client needs.
pub trait ChatApi: Send + Sync {
    /// Returns the actor owning the credential.
    fn fetch_self(&self) -> impl std::future::Future<Output = Result<Actor, ApiError>> + Send;

    /// Returns every addressable actor, the local one included.
    fn fetch_directory(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Actor>, ApiError>> + Send;

    /// Creates the conversation with `counterpart`, or returns the existing one.
    fn open_conversation(
        &self,
        counterpart: ActorId,
    ) -> impl std::future::Future<Output = Result<Conversation, ApiError>> + Send;

    /// Lists the local actor's existing conversations, newest first.
    fn list_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, ApiError>> + Send;
}

/// [`ChatApi`] over HTTP with a bearer credential.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    credential: Credential,
}

impl HttpApi {
    /// Creates a client for the API rooted at `base_url` (e.g. `https://host/api`).
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            credential,
        }
    }

    /// The API root this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        if self.credential.is_blank() {
            return Err(ApiError::Unauthenticated);
        }
        Ok(builder.bearer_auth(self.credential.expose()))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        what: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let resp = self
            .authorized(builder)?
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(format!("{what}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(%status, what, "credential rejected");
            return Err(ApiError::Unauthenticated);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, what, "request failed");
            return Err(ApiError::RequestFailed(format!("{what}: {status} {text}")));
        }

        resp.json::<ApiEnvelope<T>>()
            .await
            .map(ApiEnvelope::into_data)
            .map_err(|e| ApiError::RequestFailed(format!("{what}: undecodable body: {e}")))
    }
}

impl ChatApi for HttpApi {
    async fn fetch_self(&self) -> Result<Actor, ApiError> {
        let req = self.client.get(self.endpoint("user/me"));
        self.execute("fetch self", req).await
    }

    async fn fetch_directory(&self) -> Result<Vec<Actor>, ApiError> {
        let req = self.client.get(self.endpoint("user"));
        self.execute("fetch directory", req).await
    }

    async fn open_conversation(&self, counterpart: ActorId) -> Result<Conversation, ApiError> {
        let req = self
            .client
            .post(self.endpoint("article-user-chat"))
            .json(&OpenConversationRequest { to_id: counterpart });
        self.execute("open conversation", req).await
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let req = self
            .client
            .get(self.endpoint("article-user-chat"))
            .query(&PageQuery::default());
        self.execute("list conversations", req).await
    }
}
