//! Error types for redux-up
//!
//! [`UploadError`] is the upload taxonomy; each variant carries the short
//! status line shown to the user. [`ApiError`] maps everything onto HTTP.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Status shown when a file with an unsupported extension is offered
pub const MSG_UNSUPPORTED_FORMAT: &str = "Unsupported format! (only .wav and .png)";
/// Status shown when upload is requested with nothing selected
pub const MSG_NO_FILE_SELECTED: &str = "No file selected";
/// Status shown while a transfer is in flight
pub const MSG_UPLOADING: &str = "Upload in progress...";
/// Status shown after a successful transfer
pub const MSG_SUCCEEDED: &str = "File processed and downloaded!";
/// Status shown when the endpoint answers with anything but 200
pub const MSG_PROCESSING_ERROR: &str = "Processing error";
/// Status shown on transport failure
pub const MSG_NETWORK_ERROR: &str = "Network error";

/// Status shown when a valid file is pending
pub fn ready_message(file_name: &str) -> String {
    format!("ready: {}", file_name)
}

/// Upload lifecycle errors
#[derive(Debug, Error)]
pub enum UploadError {
    /// Extension not in the allow-set
    #[error("Unsupported format: {file_name}")]
    UnsupportedFormat { file_name: String },

    /// Upload requested with no pending selection
    #[error("No file selected")]
    NoFileSelected,

    /// A transfer is already running
    #[error("A transfer is already in progress")]
    Busy,

    /// Endpoint returned a status other than 200
    #[error("Server processing error (HTTP {status})")]
    ServerProcessing { status: u16 },

    /// Connection, DNS, timeout or body read failure
    #[error("Network error: {0}")]
    Network(String),

    /// Local file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Short human-readable status line for the view
    pub fn status_message(&self) -> String {
        match self {
            UploadError::UnsupportedFormat { .. } => MSG_UNSUPPORTED_FORMAT.to_string(),
            UploadError::NoFileSelected => MSG_NO_FILE_SELECTED.to_string(),
            UploadError::Busy => MSG_UPLOADING.to_string(),
            UploadError::ServerProcessing { .. } => MSG_PROCESSING_ERROR.to_string(),
            UploadError::Network(_) => MSG_NETWORK_ERROR.to_string(),
            UploadError::Io(err) => format!("File error: {}", err),
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Body exceeds the configured upload limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Upload lifecycle error, status depends on the variant
    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Upload(ref err) => {
                let (status, code) = match err {
                    UploadError::UnsupportedFormat { .. } => {
                        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT")
                    }
                    UploadError::NoFileSelected => (StatusCode::BAD_REQUEST, "NO_FILE_SELECTED"),
                    UploadError::Busy => (StatusCode::CONFLICT, "TRANSFER_IN_PROGRESS"),
                    UploadError::ServerProcessing { .. } => {
                        (StatusCode::BAD_GATEWAY, "PROCESSING_ERROR")
                    }
                    UploadError::Network(_) => (StatusCode::BAD_GATEWAY, "NETWORK_ERROR"),
                    UploadError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
                };
                (status, code, err.status_message())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
