//! Health check endpoint
//!
//! Reports liveness together with the session state and whether the
//! recording agent answers.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::models::SessionState;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    /// Short commit hash stamped by build.rs
    pub build: &'static str,
    pub uptime_seconds: u64,
    pub state: SessionState,
    pub agent_reachable: bool,
    /// Most recent non-conflict API error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
///
/// Always 200; an unreachable agent is reported, not treated as unhealthy.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;
    let session = state.controller.status().await;
    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status: "ok",
        module: "flingoos-ui",
        version: env!("CARGO_PKG_VERSION"),
        build: env!("GIT_HASH"),
        uptime_seconds,
        state: session.state,
        agent_reachable: session.agent_reachable,
        last_error,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
