use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the text and image generation clients.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("rate limited by the generation service (attempt {attempt})")]
    RateLimited { attempt: u32 },

    #[error("failed to fetch data from API. Status Code: {status}, Attempt: {attempt}")]
    Upstream { status: u16, attempt: u32 },

    #[error("empty response from the model")]
    EmptyResult,

    #[error("unexpected response structure from the model: {0}")]
    MalformedResponse(String),

    #[error("content policy violation: {0}")]
    ContentPolicy(String),

    #[error("max retries exceeded after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode image artifact: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl GenerationError {
    /// Only rate limiting is worth another attempt; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("no stored artifact at {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced at the HTTP edge.
///
/// Internal failures are logged in full but only a generic message reaches the
/// caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),

    #[error("failed to read stored book: {0}")]
    Download(StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(e) => {
                tracing::error!(error = ?e, "failed to generate book");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error generating book".to_string(),
                )
            }
            ApiError::Download(e) => {
                tracing::error!(error = ?e, "failed to read stored book");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error reading book".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}
