//! API error mapping: every failure becomes a non-2xx JSON body
//! `{"detail": "<human-readable with recovery steps>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use archive::agent::AgentError;
use archive::llm::LlmError;
use archive::memory::StoreError;
use archive::sandbox::SandboxError;

/// One API failure: status plus the human-readable detail.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn validation(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: detail.into(),
        }
    }

    /// Internal error with a request id the operator can grep the logs for.
    pub fn internal(detail: impl Into<String>) -> Self {
        let request_id = uuid::Uuid::new_v4();
        let detail = detail.into();
        tracing::error!(%request_id, %detail, "internal error");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: format!("internal error (request id {request_id}): {detail}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Unavailable(msg) => Self::unavailable(format!(
                "LLM engine unavailable: {msg}. Check the engine container's /health and restart it if needed."
            )),
            // Upstream resource exhaustion surfaces verbatim.
            LlmError::Resource(msg) => Self::unavailable(msg),
            LlmError::InvalidResponse(msg) => Self::internal(format!("malformed engine response: {msg}")),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => Self::unavailable(format!(
                "KV/vector store unavailable: {msg}. Check the store container and its KV_URL."
            )),
            StoreError::NotFound(id) => Self::not_found(format!("no memory under id '{id}'")),
            StoreError::InvalidEntry(msg) => Self::validation(msg),
            StoreError::Embedding(msg) => Self::unavailable(format!(
                "embedding service failed: {msg}. Check the embedder endpoint."
            )),
            StoreError::Serialization(msg) => Self::internal(msg),
        }
    }
}

impl From<SandboxError> for ApiError {
    fn from(e: SandboxError) -> Self {
        match e {
            SandboxError::Unavailable(msg) => Self::unavailable(format!(
                "code sandbox unavailable: {msg}. Check the sandbox container's /health."
            )),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Llm(inner) => inner.into(),
        }
    }
}

impl From<archive::archival::ArchiveError> for ApiError {
    fn from(e: archive::archival::ArchiveError) -> Self {
        match e {
            archive::archival::ArchiveError::Store(inner) => inner.into(),
            other => Self::internal(other.to_string()),
        }
    }
}
