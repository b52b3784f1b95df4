//! redux-up library - drag-and-drop upload widget
//!
//! Validates a `.wav`/`.png` selection, streams it to the remote processing
//! endpoint while publishing progress, and serves the returned file as a
//! download (plus an inline preview for images).

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod artifact;
pub mod error;
pub mod headless;
pub mod progress;
pub mod selection;
pub mod session;
pub mod state;
pub mod transfer;

pub use crate::error::{ApiError, ApiResult, UploadError};
pub use crate::session::{SessionConfig, TransferOutcome, UploadSession};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single upload session served by this process
    pub session: UploadSession,
    /// Largest accepted multipart body
    pub max_upload_bytes: usize,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(session: UploadSession, max_upload_bytes: usize) -> Self {
        Self {
            session,
            max_upload_bytes,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    // Multipart bodies carry a whole file; everything else stays tiny.
    let select = Router::new()
        .route("/api/select", post(api::select_file))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .route("/api/buildinfo", get(api::get_build_info))
        .route("/api/state", get(api::get_state))
        .route("/api/upload", post(api::start_upload))
        .route("/api/result", get(api::download_result).delete(api::dismiss_result))
        .route("/api/preview", get(api::preview_result))
        .route("/api/events", get(api::event_stream))
        .merge(select)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
