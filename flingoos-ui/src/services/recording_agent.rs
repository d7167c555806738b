//! Recording agent contract and HTTP client
//!
//! The recording agent ("bridge") captures audio, screenshots and telemetry
//! while a session is active. The controller only needs three commands from
//! it: start, stop, and a reachability probe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("flingoos-ui/", env!("CARGO_PKG_VERSION"));
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Recording agent errors
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The agent answered but refused the command
    #[error("Agent rejected command: {0}")]
    Rejected(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Contract the session controller drives
#[async_trait]
pub trait RecordingAgent: Send + Sync {
    /// Begin capturing; failure aborts session start
    async fn start_recording(&self) -> Result<(), AgentError>;

    /// Stop capturing and flush; failure is logged by the caller only
    async fn stop_recording(&self) -> Result<(), AgentError>;

    /// Live reachability probe, never errors
    async fn is_reachable(&self) -> bool;
}

/// Command reply body: `{"success": bool, "error": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReply {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// HTTP client for the recording agent
///
/// - `POST {base}/commands/audio_start`
/// - `POST {base}/commands/audio_stop`
/// - `GET  {base}/health`
pub struct BridgeClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_command(&self, command: &str) -> Result<(), AgentError> {
        let url = format!("{}/commands/{}", self.base_url, command);
        tracing::debug!(command = %command, url = %url, "Sending command to recording agent");

        let response = self
            .http_client
            .post(&url)
            .send()
            .await
            .map_err(|e| AgentError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::ApiError(status.as_u16(), error_text));
        }

        let reply: CommandReply = response
            .json()
            .await
            .map_err(|e| AgentError::ParseError(e.to_string()))?;

        if reply.success {
            Ok(())
        } else {
            Err(AgentError::Rejected(
                reply.error.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        }
    }
}

#[async_trait]
impl RecordingAgent for BridgeClient {
    async fn start_recording(&self) -> Result<(), AgentError> {
        self.send_command("audio_start").await
    }

    async fn stop_recording(&self) -> Result<(), AgentError> {
        self.send_command("audio_stop").await
    }

    async fn is_reachable(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .http_client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Recording agent not reachable");
                false
            }
        }
    }
}
