//! Request and response bodies of the REST endpoints the chat consumes.

use serde::{Deserialize, Serialize};

use crate::actor::ActorId;

/// A REST response body.
///
/// The backend answers either with a `{ "statusCode", "data" }` wrapper or
/// with the bare payload, depending on the endpoint. Both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiEnvelope<T> {
    /// Wrapped form.
    Wrapped {
        /// HTTP-like status code echoed in the body.
        #[serde(rename = "statusCode")]
        status_code: u16,
        /// The payload.
        data: T,
    },
    /// Bare payload.
    Bare(T),
}

impl<T> ApiEnvelope<T> {
    /// Unwraps the payload regardless of form.
    pub fn into_data(self) -> T {
        match self {
            Self::Wrapped { data, .. } | Self::Bare(data) => data,
        }
    }

    /// Wraps `data` the way the backend does for successful responses.
    pub const fn ok(data: T) -> Self {
        Self::Wrapped {
            status_code: 200,
            data,
        }
    }
}

/// Body of the create-or-get conversation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenConversationRequest {
    /// The counterpart of the conversation.
    pub to_id: ActorId,
}

/// Query of the paginated conversation listing. Absent fields take the
/// defaults the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Field to sort by.
    pub sort_by: String,
    /// `asc` or `desc`.
    pub sort_order: String,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 100,
            sort_by: "createdAt".to_string(),
            sort_order: "desc".to_string(),
        }
    }
}
