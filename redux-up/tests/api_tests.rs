//! Integration tests for redux-up HTTP endpoints
//!
//! The router runs in-process with a scripted transfer client, so no request
//! ever leaves the test.

mod helpers;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

use helpers::{session_with, FakeClient, Reply};
use redux_up::{build_router, AppState};

const BOUNDARY: &str = "redux-test-boundary";

/// Test helper: router over a scripted client
fn setup_app(client: Arc<FakeClient>, max_upload_bytes: usize) -> Router {
    build_router(AppState::new(session_with(client), max_upload_bytes))
}

/// Test helper: request with an empty body
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: POST /api/select with one multipart field
fn select_request(field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/select")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn get_state(app: &Router) -> Value {
    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/state"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    extract_json(response.into_body()).await
}

/// Poll /api/state until the transfer leaves `uploading`
async fn wait_for_outcome(app: &Router) -> Value {
    for _ in 0..500 {
        let state = get_state(app).await;
        if state["phase"] != "uploading" {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Transfer never finished");
}

// =============================================================================
// Health and static content
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(FakeClient::new(Reply::ok(b"out")), 1024);

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "redux-up");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_buildinfo_endpoint() {
    let app = setup_app(FakeClient::new(Reply::ok(b"out")), 1024);

    let response = app
        .oneshot(test_request("GET", "/api/buildinfo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["git_hash"].is_string());
}

#[tokio::test]
async fn test_index_and_script_served() {
    let app = setup_app(FakeClient::new(Reply::ok(b"out")), 1024);

    let response = app.clone().oneshot(test_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&html).contains("accept=\".wav,.png\""));

    let response = app
        .oneshot(test_request("GET", "/static/app.js"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/javascript"
    );
}

// =============================================================================
// Selection
// =============================================================================

#[tokio::test]
async fn test_initial_state_is_idle() {
    let app = setup_app(FakeClient::new(Reply::ok(b"out")), 1024);

    let state = get_state(&app).await;
    assert_eq!(state["phase"], "idle");
    assert_eq!(state["progress_percent"], 0);
    assert!(state["selection"].is_null());
    assert!(state["result"].is_null());
}

#[tokio::test]
async fn test_select_accepts_wav() {
    let app = setup_app(FakeClient::new(Reply::ok(b"out")), 1024);

    let response = app
        .clone()
        .oneshot(select_request("file", "song.wav", b"RIFF...."))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["file_name"], "song.wav");
    assert_eq!(body["kind"], "audio");
    assert_eq!(body["size_bytes"], 8);

    let state = get_state(&app).await;
    assert_eq!(state["phase"], "selected");
    assert_eq!(state["status_message"], "ready: song.wav");
}

#[tokio::test]
async fn test_select_rejects_unsupported_format() {
    let app = setup_app(FakeClient::new(Reply::ok(b"out")), 1024);

    let response = app
        .clone()
        .oneshot(select_request("file", "report.pdf", b"%PDF"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNSUPPORTED_FORMAT");
    assert_eq!(
        body["error"]["message"],
        "Unsupported format! (only .wav and .png)"
    );

    let state = get_state(&app).await;
    assert_eq!(state["phase"], "idle");
    assert!(state["selection"].is_null());
}

#[tokio::test]
async fn test_select_requires_file_field() {
    let app = setup_app(FakeClient::new(Reply::ok(b"out")), 1024);

    let response = app
        .oneshot(select_request("attachment", "song.wav", b"data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_select_over_limit_is_rejected() {
    let app = setup_app(FakeClient::new(Reply::ok(b"out")), 1024);

    let response = app
        .clone()
        .oneshot(select_request("file", "song.wav", &vec![0u8; 4096]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let state = get_state(&app).await;
    assert_eq!(state["phase"], "idle");
}

// =============================================================================
// Upload and result
// =============================================================================

#[tokio::test]
async fn test_upload_without_selection() {
    let client = FakeClient::new(Reply::ok(b"out"));
    let app = setup_app(client.clone(), 1024);

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/upload"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NO_FILE_SELECTED");
    assert_eq!(body["error"]["message"], "No file selected");
    assert_eq!(client.calls(), 0);

    let state = get_state(&app).await;
    assert_eq!(state["status_message"], "No file selected");
}

#[tokio::test]
async fn test_upload_image_then_download_and_preview() {
    let client = FakeClient::new(Reply::ok_with_metadata(b"processed-png", 40, 12));
    let app = setup_app(client.clone(), 1024);

    let response = app
        .clone()
        .oneshot(select_request("file", "chart.png", b"\x89PNG"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/upload"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let started = extract_json(response.into_body()).await;
    assert!(started["transfer_id"].is_string());

    let state = wait_for_outcome(&app).await;
    assert_eq!(state["phase"], "succeeded");
    assert_eq!(state["progress_percent"], 100);
    assert_eq!(state["status_message"], "File processed and downloaded!");
    assert_eq!(state["result"]["download_name"], "processed_chart.png");
    assert_eq!(state["result"]["preview_url"], "/api/preview");
    assert_eq!(state["metadata"]["initial_variables"], 40);
    assert_eq!(state["metadata"]["retained_components"], 12);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/result"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"processed_chart.png\""
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"processed-png");

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/preview"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Dismiss releases both
    let response = app
        .clone()
        .oneshot(test_request("DELETE", "/api/result"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/result"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app
        .oneshot(test_request("GET", "/api/preview"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_audio_result_has_no_preview() {
    let app = setup_app(FakeClient::new(Reply::ok(b"processed-wav")), 1024);

    app.clone()
        .oneshot(select_request("file", "song.wav", b"RIFF"))
        .await
        .unwrap();
    app.clone()
        .oneshot(test_request("POST", "/api/upload"))
        .await
        .unwrap();
    let state = wait_for_outcome(&app).await;
    assert_eq!(state["phase"], "succeeded");
    assert!(state["result"]["preview_url"].is_null());

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/result"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");

    let response = app
        .oneshot(test_request("GET", "/api/preview"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_upload_reports_processing_error() {
    let app = setup_app(FakeClient::new(Reply::status(500)), 1024);

    app.clone()
        .oneshot(select_request("file", "song.wav", b"RIFF"))
        .await
        .unwrap();
    app.clone()
        .oneshot(test_request("POST", "/api/upload"))
        .await
        .unwrap();

    let state = wait_for_outcome(&app).await;
    assert_eq!(state["phase"], "failed");
    assert_eq!(state["progress_percent"], 0);
    assert_eq!(state["status_message"], "Processing error");
    assert!(state["selection"].is_null());

    let response = app
        .oneshot(test_request("GET", "/api/result"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_busy_upload_conflicts() {
    let client = FakeClient::gated(Reply::ok(b"out"));
    let app = setup_app(client.clone(), 1024);

    app.clone()
        .oneshot(select_request("file", "song.wav", b"RIFF"))
        .await
        .unwrap();
    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/upload"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/upload"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(select_request("file", "chart.png", b"PNG"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    client.release();
    let state = wait_for_outcome(&app).await;
    assert_eq!(state["phase"], "succeeded");
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_dismiss_without_result_is_no_content() {
    let app = setup_app(FakeClient::new(Reply::ok(b"out")), 1024);

    let response = app
        .oneshot(test_request("DELETE", "/api/result"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
