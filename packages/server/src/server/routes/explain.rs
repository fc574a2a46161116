//! Streaming explanation endpoint.
//!
//! POST /api/explain
//!
//! Credentials are checked before the body is read, so an unauthenticated
//! caller never reaches validation or any backend.

use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    extract::Extension,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use explain_stream::encode_frame;
use futures::StreamExt;

use crate::common::parse_explain_request;
use crate::domains::auth::AuthContext;
use crate::domains::explain::{explain, ExplainError};
use crate::server::app::AppState;

pub async fn explain_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthContext>>,
    body: Bytes,
) -> Result<Response, ExplainError> {
    let Some(Extension(auth)) = auth else {
        return Err(ExplainError::Unauthorized);
    };

    let request = parse_explain_request(&body).map_err(ExplainError::InvalidPayload)?;

    let frames = explain(state.deps.clone(), request, auth)
        .map(|frame| Ok::<_, Infallible>(encode_frame(&frame)));

    Ok((
        [
            (CONTENT_TYPE, explain_stream::CONTENT_TYPE),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}
