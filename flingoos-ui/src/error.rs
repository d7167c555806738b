//! Error types for flingoos-ui
//!
//! Handlers return [`ApiError`], rendered as
//! `{"error": {"code": ..., "message": ...}}`.

use crate::services::SessionError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409) - start/stop in the wrong session state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad gateway (502) - recording agent refused or unreachable
    #[error("Bad gateway: {0}")]
    BadGateway(String),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AlreadyActive(_) | SessionError::NoActiveSession(_) => {
                ApiError::Conflict(err.to_string())
            }
            SessionError::AgentStartFailed(_) => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "AGENT_UNAVAILABLE", msg),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionState;
    use crate::services::AgentError;

    #[test]
    fn test_session_error_status_mapping() {
        let conflict = ApiError::from(SessionError::NoActiveSession(SessionState::Idle));
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let conflict = ApiError::from(SessionError::AlreadyActive(SessionState::Processing));
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let gateway = ApiError::from(SessionError::AgentStartFailed(AgentError::NetworkError(
            "connection refused".into(),
        )));
        assert_eq!(gateway.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_not_found_status() {
        let err = ApiError::NotFound("No workflow available".into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
