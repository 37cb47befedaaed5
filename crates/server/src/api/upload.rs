//! Batch submission.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use reuploader_core::{AssetType, BatchRequest};

use crate::metrics::UPLOADS_REFUSED;
use crate::state::AppState;

/// Body sent when a batch is already in progress.
const IN_PROGRESS_MESSAGE: &str = "POST has already started.";

/// Body sent when a batch is accepted.
const ACCEPTED_MESSAGE: &str = "Upload started successfully.";

/// Why an upload body was refused. The display text is the response body.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RequestShapeError {
    #[error("MissingData")]
    MissingData,

    #[error("InvalidAssetIds")]
    InvalidAssetIds,

    #[error("InvalidAssetType")]
    InvalidAssetType,
}

impl IntoResponse for RequestShapeError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Parse an upload body.
///
/// Expected: `{"assetType": "Animation"|"Audio", "assetIds": [int, ...],
/// "creatorId": int, "isGroup": bool}`.
pub fn parse_upload(body: &[u8]) -> Result<BatchRequest, RequestShapeError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|_| RequestShapeError::MissingData)?;
    let fields = value.as_object().ok_or(RequestShapeError::MissingData)?;

    let asset_type = present(fields, "assetType")?;
    let asset_ids = present(fields, "assetIds")?;
    let creator_id = present(fields, "creatorId")?;
    let is_group = present(fields, "isGroup")?;

    let creator_id = creator_id
        .as_u64()
        .filter(|id| *id > 0)
        .ok_or(RequestShapeError::MissingData)?;
    let is_group_target = is_group.as_bool().ok_or(RequestShapeError::MissingData)?;

    let asset_ids = asset_ids
        .as_array()
        .filter(|ids| !ids.is_empty())
        .ok_or(RequestShapeError::InvalidAssetIds)?
        .iter()
        .map(|id| id.as_u64().filter(|id| *id > 0))
        .collect::<Option<Vec<u64>>>()
        .ok_or(RequestShapeError::InvalidAssetIds)?;

    let asset_type = asset_type
        .as_str()
        .and_then(|s| s.parse::<AssetType>().ok())
        .ok_or(RequestShapeError::InvalidAssetType)?;

    Ok(BatchRequest {
        asset_type,
        creator_id,
        is_group_target,
        asset_ids,
    })
}

/// A field that is present and not null.
fn present<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a Value, RequestShapeError> {
    match fields.get(name) {
        Some(Value::Null) | None => Err(RequestShapeError::MissingData),
        Some(value) => Ok(value),
    }
}

/// Start a batch. Responds as soon as the batch is accepted; progress is
/// reported through `/status`.
pub async fn start_upload(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let tracker = state.tracker();

    if tracker.is_busy().await {
        UPLOADS_REFUSED.with_label_values(&["in_progress"]).inc();
        warn!("Upload refused, a batch is already in progress");
        return (StatusCode::UNAUTHORIZED, IN_PROGRESS_MESSAGE).into_response();
    }

    let request = match parse_upload(&body) {
        Ok(request) => request,
        Err(e) => {
            UPLOADS_REFUSED.with_label_values(&[&e.to_string()]).inc();
            error!(reason = %e, "Upload body rejected, the plugin may be out of date");
            return e.into_response();
        }
    };

    // Another request may have claimed the tracker since the check above
    if tracker.try_begin().await.is_err() {
        UPLOADS_REFUSED.with_label_values(&["in_progress"]).inc();
        return (StatusCode::UNAUTHORIZED, IN_PROGRESS_MESSAGE).into_response();
    }

    info!(
        asset_type = %request.asset_type,
        assets = request.asset_ids.len(),
        creator_id = request.creator_id,
        is_group = request.is_group_target,
        "Upload accepted"
    );

    let pipeline = Arc::clone(state.pipeline());
    let tracker = Arc::clone(tracker);
    tokio::spawn(async move {
        pipeline.publish_batch(request, tracker).await;
    });

    (StatusCode::OK, ACCEPTED_MESSAGE).into_response()
}
