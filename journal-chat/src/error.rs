//! Public error taxonomy of the conversation client.

use crate::api::ApiError;
use crate::transport::TransportError;

/// Errors surfaced to callers of [`crate::client::ChatClient`].
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The credential is missing or was rejected. Fatal to the session;
    /// the caller must send the user back to login.
    #[error("not authenticated")]
    Unauthenticated,

    /// There is no connection to the messaging server. Operations fail
    /// fast instead of being queued.
    #[error("messaging server unavailable")]
    TransportUnavailable,

    /// A single request failed. Not retried automatically.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// An inbound event did not match its schema and was dropped.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The message body is blank after trimming.
    #[error("message body is empty")]
    EmptyMessage,
}

impl From<ApiError> for ChatError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthenticated => Self::Unauthenticated,
            ApiError::RequestFailed(reason) => Self::RequestFailed(reason),
        }
    }
}

impl From<TransportError> for ChatError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unavailable | TransportError::ReplyDropped => {
                Self::TransportUnavailable
            }
            TransportError::Timeout => Self::RequestFailed("request timed out".to_string()),
            TransportError::Codec(e) => Self::MalformedEvent(e.to_string()),
        }
    }
}
