//! Session control API handlers
//!
//! POST /api/session/start, POST /api/session/stop,
//! GET /api/session/status, GET /api/workflow

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use flingoos_common::events::WorkflowResult;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::SessionState,
    services::SessionError,
    AppState,
};

/// POST /api/session/start response
#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub message: String,
}

/// POST /api/session/stop response
#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub message: String,
}

/// GET /api/session/status response
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub success: bool,
    pub session_active: bool,
    pub state: SessionState,
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub bridge_connected: bool,
    pub has_workflow: bool,
}

/// POST /api/session/start
///
/// 409 if a session is already running, 502 if the recording agent could
/// not be started.
pub async fn start_session(
    State(state): State<AppState>,
) -> ApiResult<Json<StartSessionResponse>> {
    let session = match state.controller.start().await {
        Ok(session) => session,
        Err(e) => return Err(session_error(&state, e).await),
    };

    Ok(Json(StartSessionResponse {
        success: true,
        session_id: session.id,
        started_at: session.started_at,
        message: "Session started".to_string(),
    }))
}

/// POST /api/session/stop
///
/// Returns as soon as the pipeline is launched; progress arrives over SSE.
pub async fn stop_session(
    State(state): State<AppState>,
) -> ApiResult<Json<StopSessionResponse>> {
    let session_id = match state.controller.stop().await {
        Ok(session_id) => session_id,
        Err(e) => return Err(session_error(&state, e).await),
    };

    Ok(Json(StopSessionResponse {
        success: true,
        session_id,
        message: "Session stopped, processing workflow...".to_string(),
    }))
}

/// GET /api/session/status
pub async fn session_status(State(state): State<AppState>) -> Json<SessionStatusResponse> {
    let status = state.controller.status().await;

    Json(SessionStatusResponse {
        success: true,
        session_active: status.active,
        state: status.state,
        session_id: status.session_id,
        started_at: status.started_at,
        bridge_connected: status.agent_reachable,
        has_workflow: status.has_result,
    })
}

/// GET /api/workflow
///
/// Result of the last completed cycle; 404 before the first one finishes.
pub async fn current_workflow(State(state): State<AppState>) -> ApiResult<Json<WorkflowResult>> {
    state
        .controller
        .current_result()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No workflow available".to_string()))
}

/// Agent failures are kept for /health; state conflicts are routine
async fn session_error(state: &AppState, err: SessionError) -> ApiError {
    if !err.is_state_conflict() {
        state.record_error(err.to_string()).await;
    }
    ApiError::from(err)
}

/// Build session control routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/session/start", post(start_session))
        .route("/api/session/stop", post(stop_session))
        .route("/api/session/status", get(session_status))
        .route("/api/workflow", get(current_workflow))
}
