//! Server-Sent Events for upload lifecycle updates

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /api/events - SSE event stream
///
/// Streams events:
/// - SelectionAccepted / SelectionRejected
/// - TransferStarted, TransferProgress
/// - TransferSucceeded / TransferFailed
/// - ArtifactReleased
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    redux_common::sse::event_bus_sse_stream(state.session.bus(), "redux-up")
}
