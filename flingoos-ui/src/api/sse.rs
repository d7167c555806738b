//! Server-Sent Events (SSE) for session progress streaming

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events - SSE event stream
///
/// Streams every session event:
/// - SessionStarted
/// - SessionStopped
/// - ProgressUpdate (one per step transition)
/// - SessionReady / SessionFallback
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    flingoos_common::sse::create_session_sse_stream("flingoos-ui", &state.event_bus)
}
