use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use reuploader_core::PollResponse;

use crate::metrics::encode_metrics;
use crate::state::AppState;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Liveness check; the plugin compares the version string.
pub async fn connect() -> &'static str {
    VERSION
}

/// Poll for progress on the current batch.
///
/// Replies "Idle", "Uploading", a JSON object of newly completed
/// old id to new id mappings, or "Done" exactly once after the last mapping.
pub async fn status(State(state): State<Arc<AppState>>) -> Response {
    match state.tracker().poll().await {
        PollResponse::Idle => "Idle".into_response(),
        PollResponse::Uploading => "Uploading".into_response(),
        PollResponse::Completed(mappings) => Json(mappings).into_response(),
        PollResponse::Done => {
            tracing::info!("All results delivered, ready for the next batch");
            "Done".into_response()
        }
    }
}

/// Prometheus text exposition.
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
