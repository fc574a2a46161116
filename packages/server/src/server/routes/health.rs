use axum::{extract::Extension, Json};
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    demo_mode: bool,
    retrieval: bool,
}

/// Health check endpoint
///
/// Reports whether generation runs in demo mode and whether source
/// retrieval is configured. Always 200 while the process is serving.
pub async fn health_handler(Extension(state): Extension<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        demo_mode: state.deps.demo_mode(),
        retrieval: state.deps.retrieval_enabled(),
    })
}
