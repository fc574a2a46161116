use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::common::FieldError;

pub type Result<T> = std::result::Result<T, ExplainError>;

/// Failures surfaced to HTTP callers before (or instead of) a stream.
///
/// Once a stream has started, failures travel as a terminal `error` frame
/// instead.
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid payload ({} field(s))", .0.len())]
    InvalidPayload(Vec<FieldError>),

    #[error("generation backend failed: {0}")]
    Backend(String),
}

impl IntoResponse for ExplainError {
    fn into_response(self) -> Response {
        match self {
            ExplainError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response(),
            ExplainError::InvalidPayload(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid payload", "details": details })),
            )
                .into_response(),
            ExplainError::Backend(message) => {
                tracing::error!(error = %message, "backend call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "Upstream failure" })),
                )
                    .into_response()
            }
        }
    }
}
