use axum::{body::Bytes, extract::Extension, Json};
use serde::Serialize;

use crate::common::FollowupRequest;
use crate::domains::auth::AuthContext;
use crate::domains::explain::{answer_followup, ExplainError};
use crate::server::app::AppState;

#[derive(Debug, Serialize)]
pub struct FollowupResponse {
    pub text: String,
}

/// POST /api/followup
pub async fn followup_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthContext>>,
    body: Bytes,
) -> Result<Json<FollowupResponse>, ExplainError> {
    if auth.is_none() {
        return Err(ExplainError::Unauthorized);
    }

    let request = FollowupRequest::from_json(&body).map_err(ExplainError::InvalidPayload)?;
    let text = answer_followup(&state.deps, request).await?;
    Ok(Json(FollowupResponse { text }))
}
