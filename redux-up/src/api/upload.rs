//! Selection and transfer endpoints

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::selection::SelectionSummary;
use crate::state::TransferState;
use crate::transfer::FILE_FIELD;
use crate::AppState;

/// Response to a successful upload start
#[derive(Debug, Serialize)]
pub struct UploadStarted {
    pub transfer_id: Uuid,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}

/// GET /api/state
///
/// Current view state of the session
pub async fn get_state(State(state): State<AppState>) -> Json<TransferState> {
    Json(state.session.snapshot().await)
}

/// POST /api/select
///
/// Multipart body with a single `file` field. Drag-and-drop and the file
/// picker both end up here.
///
/// - 200: selection accepted
/// - 415: unsupported extension (any previous selection is dropped)
/// - 409: a transfer is in progress (nothing changes)
pub async fn select_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<SelectionSummary>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            debug!("select: skipping field {:?}", field.name());
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("'file' field has no file name".to_string()))?;
        let data = field.bytes().await.map_err(multipart_error)?;

        let summary = state.session.select(file_name, data).await?;
        return Ok(Json(summary));
    }

    Err(ApiError::BadRequest(format!("Missing '{}' field", FILE_FIELD)))
}

/// POST /api/upload
///
/// Starts the transfer of the pending selection in the background.
///
/// - 202: transfer started; follow progress on /api/events
/// - 400: no file selected
/// - 409: a transfer is already in progress
pub async fn start_upload(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<UploadStarted>)> {
    let handle = state.session.start_upload().await?;
    let transfer_id = handle.transfer_id();
    info!("upload started: {}", transfer_id);

    // The session records the outcome itself; the handle is only for waiters.
    drop(handle);

    Ok((StatusCode::ACCEPTED, Json(UploadStarted { transfer_id })))
}
