//! Result artifact endpoints

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/result
///
/// Serves the processed file as an attachment named `processed_<original>`.
pub async fn download_result(State(state): State<AppState>) -> ApiResult<Response> {
    let artifact = state
        .session
        .artifact()
        .await
        .ok_or_else(|| ApiError::NotFound("No result available".to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.content_type().to_string()),
            (header::CONTENT_DISPOSITION, artifact.attachment_disposition()),
        ],
        artifact.data.clone(),
    )
        .into_response())
}

/// GET /api/preview
///
/// Serves an image result inline. Audio results have no preview.
pub async fn preview_result(State(state): State<AppState>) -> ApiResult<Response> {
    let artifact = state
        .session
        .artifact()
        .await
        .filter(|a| a.previewable())
        .ok_or_else(|| ApiError::NotFound("No preview available".to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.content_type()),
            (header::CACHE_CONTROL, "no-store"),
        ],
        artifact.data.clone(),
    )
        .into_response())
}

/// DELETE /api/result
///
/// Releases the current result. Idempotent.
pub async fn dismiss_result(State(state): State<AppState>) -> StatusCode {
    state.session.dismiss_result().await;
    StatusCode::NO_CONTENT
}
