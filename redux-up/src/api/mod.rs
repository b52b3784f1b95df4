//! HTTP API handlers for redux-up

pub mod buildinfo;
pub mod health;
pub mod result;
pub mod sse;
pub mod ui;
pub mod upload;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use result::{dismiss_result, download_result, preview_result};
pub use sse::event_stream;
pub use ui::{serve_app_js, serve_index};
pub use upload::{get_state, select_file, start_upload};
