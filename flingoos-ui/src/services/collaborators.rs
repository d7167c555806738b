//! Processing collaborator facade
//!
//! The three external services invoked by the pipeline's action steps:
//! trigger generation, the remote processing pipeline ("forge"), and the
//! workflow result store. Each operation returns a `Result`; the sequencer
//! logs failures and moves on.
//!
//! Result-store records must carry a `workflow_data` object. Anything else is
//! treated as "no result" rather than partially parsed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flingoos_common::events::WorkflowResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

const USER_AGENT: &str = concat!("flingoos-ui/", env!("CARGO_PKG_VERSION"));
const TRIGGER_VERSION: &str = "1.0";

/// Collaborator errors
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    /// Collaborator answered but reported failure
    #[error("Processing rejected: {0}")]
    Rejected(String),

    #[error("Invalid time window: {0}")]
    InvalidWindow(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(e: reqwest::Error) -> Self {
        CollaboratorError::NetworkError(e.to_string())
    }
}

/// Descriptor handed to the remote processing pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDescriptor {
    pub session_id: Uuid,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
    /// Generator-specific content, opaque to the pipeline
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl TriggerDescriptor {
    /// Bare descriptor used when trigger generation failed
    pub fn minimal(session_id: Uuid) -> Self {
        Self {
            session_id,
            version: TRIGGER_VERSION.to_string(),
            window_start: None,
            window_end: None,
            generated_at: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }
}

/// Remote processing acknowledgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingAck {
    pub status: String,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProcessingAck {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// Result-store record
#[derive(Debug, Clone, Deserialize)]
pub struct StoredWorkflow {
    #[serde(default)]
    pub workflow_id: Option<String>,
    pub workflow_data: StoredWorkflowData,
    #[serde(default)]
    pub firestore_url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// `workflow_data` object of a result-store record
#[derive(Debug, Clone, Deserialize)]
pub struct StoredWorkflowData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub productivity_score: Option<f64>,
    #[serde(default)]
    pub guide_markdown: Option<String>,
}

impl StoredWorkflow {
    /// Parse a raw store response; non-conforming shapes yield `None`
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        match serde_json::from_value::<StoredWorkflow>(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "Result store returned a non-conforming record");
                None
            }
        }
    }
}

impl From<StoredWorkflow> for WorkflowResult {
    fn from(record: StoredWorkflow) -> Self {
        let data = record.workflow_data;
        WorkflowResult::real(
            data.title.unwrap_or_else(|| "Unknown Workflow".to_string()),
            record.workflow_id.unwrap_or_else(|| "unknown".to_string()),
            data.productivity_score.unwrap_or(0.0),
            data.guide_markdown.unwrap_or_default(),
            record.firestore_url,
        )
    }
}

/// Facade over the processing collaborators
#[async_trait]
pub trait ProcessingCollaborators: Send + Sync {
    async fn generate_trigger(
        &self,
        session_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<TriggerDescriptor, CollaboratorError>;

    async fn trigger_processing(
        &self,
        descriptor: &TriggerDescriptor,
    ) -> Result<ProcessingAck, CollaboratorError>;

    /// `Ok(None)` when the store has nothing for `cohort_key`
    async fn retrieve_result(
        &self,
        cohort_key: &str,
    ) -> Result<Option<WorkflowResult>, CollaboratorError>;
}

/// Local trigger descriptor generator
///
/// Optionally keeps a copy of every descriptor as
/// `trigger_<session_id>.json` for debugging.
pub struct TriggerGenerator {
    output_dir: Option<PathBuf>,
}

impl TriggerGenerator {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }

    pub async fn generate(
        &self,
        session_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<TriggerDescriptor, CollaboratorError> {
        if window_end < window_start {
            return Err(CollaboratorError::InvalidWindow(format!(
                "end {} precedes start {}",
                window_end, window_start
            )));
        }

        let duration_seconds = (window_end - window_start).num_seconds();
        let descriptor = TriggerDescriptor {
            session_id,
            version: TRIGGER_VERSION.to_string(),
            window_start: Some(window_start),
            window_end: Some(window_end),
            generated_at: Utc::now(),
            payload: serde_json::json!({
                "time_window": {
                    "start": window_start.to_rfc3339(),
                    "end": window_end.to_rfc3339(),
                    "duration_seconds": duration_seconds,
                },
                "data_sources": ["audio", "screenshots", "telemetry"],
            }),
        };

        if let Some(dir) = &self.output_dir {
            let path = dir.join(format!("trigger_{}.json", session_id));
            let json = serde_json::to_vec_pretty(&descriptor)
                .map_err(|e| CollaboratorError::ParseError(e.to_string()))?;
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CollaboratorError::Io(e.to_string()))?;
            tokio::fs::write(&path, json)
                .await
                .map_err(|e| CollaboratorError::Io(e.to_string()))?;
            tracing::debug!(path = %path.display(), "Trigger descriptor saved");
        }

        Ok(descriptor)
    }
}

/// HTTP client for the remote processing pipeline
///
/// `POST {base}/process` with the descriptor as JSON body.
pub struct ForgeClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ForgeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn process(
        &self,
        descriptor: &TriggerDescriptor,
    ) -> Result<ProcessingAck, CollaboratorError> {
        let url = format!("{}/process", self.base_url);
        tracing::debug!(session_id = %descriptor.session_id, url = %url, "Triggering remote processing");

        let response = self.http_client.post(&url).json(descriptor).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::ApiError(status.as_u16(), error_text));
        }

        let ack: ProcessingAck = response
            .json()
            .await
            .map_err(|e| CollaboratorError::ParseError(e.to_string()))?;

        if !ack.is_completed() {
            return Err(CollaboratorError::Rejected(
                ack.error
                    .clone()
                    .or_else(|| ack.message.clone())
                    .unwrap_or_else(|| format!("status '{}'", ack.status)),
            ));
        }

        Ok(ack)
    }
}

/// HTTP client for the workflow result store
///
/// `GET {base}/workflows/random?cohort=<key>`; 404 means no result.
pub struct WorkflowStoreClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl WorkflowStoreClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            http_client: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn random_published_workflow(
        &self,
        cohort_key: &str,
    ) -> Result<Option<StoredWorkflow>, CollaboratorError> {
        let url = format!("{}/workflows/random", self.base_url);
        tracing::debug!(cohort = %cohort_key, url = %url, "Querying result store");

        let response = self
            .http_client
            .get(&url)
            .query(&[("cohort", cohort_key)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::ApiError(status.as_u16(), error_text));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CollaboratorError::ParseError(e.to_string()))?;

        Ok(StoredWorkflow::from_value(value))
    }
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, CollaboratorError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| CollaboratorError::NetworkError(e.to_string()))
}

/// Production facade composing the local generator and the HTTP clients
pub struct ServiceCollaborators {
    trigger_generator: TriggerGenerator,
    forge: ForgeClient,
    store: WorkflowStoreClient,
}

impl ServiceCollaborators {
    pub fn new(
        trigger_generator: TriggerGenerator,
        forge: ForgeClient,
        store: WorkflowStoreClient,
    ) -> Self {
        Self {
            trigger_generator,
            forge,
            store,
        }
    }
}

#[async_trait]
impl ProcessingCollaborators for ServiceCollaborators {
    async fn generate_trigger(
        &self,
        session_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<TriggerDescriptor, CollaboratorError> {
        self.trigger_generator
            .generate(session_id, window_start, window_end)
            .await
    }

    async fn trigger_processing(
        &self,
        descriptor: &TriggerDescriptor,
    ) -> Result<ProcessingAck, CollaboratorError> {
        self.forge.process(descriptor).await
    }

    async fn retrieve_result(
        &self,
        cohort_key: &str,
    ) -> Result<Option<WorkflowResult>, CollaboratorError> {
        let record = self.store.random_published_workflow(cohort_key).await?;
        Ok(record.map(|r| {
            tracing::info!(
                workflow_id = r.workflow_id.as_deref().unwrap_or("unknown"),
                source = r.source.as_deref().unwrap_or("firestore"),
                "Retrieved workflow record"
            );
            WorkflowResult::from(r)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use flingoos_common::events::ResultOrigin;
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_stored_workflow_maps_one_to_one() {
        let record = StoredWorkflow::from_value(serde_json::json!({
            "workflow_id": "wf-981",
            "workflow_data": {
                "title": "Invoice triage",
                "productivity_score": 0.62,
                "guide_markdown": "# Invoice triage"
            },
            "firestore_url": "https://console.example/wf-981",
            "source": "firestore"
        }))
        .unwrap();

        let result = WorkflowResult::from(record);
        assert_eq!(result.origin, ResultOrigin::Real);
        assert_eq!(result.title, "Invoice triage");
        assert_eq!(result.external_id, "wf-981");
        assert_eq!(result.score, 0.62);
        assert_eq!(result.guide_content, "# Invoice triage");
        assert_eq!(result.result_link.as_deref(), Some("https://console.example/wf-981"));
    }

    #[test]
    fn test_stored_workflow_inner_defaults() {
        let record = StoredWorkflow::from_value(serde_json::json!({ "workflow_data": {} })).unwrap();
        let result = WorkflowResult::from(record);

        assert_eq!(result.title, "Unknown Workflow");
        assert_eq!(result.external_id, "unknown");
        assert_eq!(result.score, 0.0);
        assert_eq!(result.guide_content, "");
        assert!(result.result_link.is_none());
    }

    #[test]
    fn test_non_conforming_record_is_absence() {
        assert!(StoredWorkflow::from_value(serde_json::Value::Null).is_none());
        assert!(StoredWorkflow::from_value(serde_json::json!({ "workflow": { "title": "x" } })).is_none());
        assert!(StoredWorkflow::from_value(serde_json::json!({ "workflow_data": "flat string" })).is_none());
        assert!(StoredWorkflow::from_value(serde_json::json!([1, 2, 3])).is_none());
    }

    #[tokio::test]
    async fn test_trigger_generator_writes_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let generator = TriggerGenerator::new(Some(dir.path().join("triggers")));
        let session_id = Uuid::new_v4();
        let start = Utc::now() - chrono::Duration::seconds(90);
        let end = Utc::now();

        let descriptor = generator.generate(session_id, start, end).await.unwrap();
        assert_eq!(descriptor.session_id, session_id);
        assert_eq!(descriptor.version, "1.0");
        assert_eq!(descriptor.payload["time_window"]["duration_seconds"], 90);

        let path = dir.path().join("triggers").join(format!("trigger_{}.json", session_id));
        let saved: TriggerDescriptor =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(saved, descriptor);
    }

    #[tokio::test]
    async fn test_trigger_generator_rejects_inverted_window() {
        let generator = TriggerGenerator::new(None);
        let now = Utc::now();
        let result = generator
            .generate(Uuid::new_v4(), now, now - chrono::Duration::seconds(1))
            .await;
        assert!(matches!(result, Err(CollaboratorError::InvalidWindow(_))));
    }

    #[tokio::test]
    async fn test_forge_client_ack_handling() {
        let router = Router::new().route(
            "/process",
            post(|Json(descriptor): Json<TriggerDescriptor>| async move {
                let status = if descriptor.payload.is_null() { "failed" } else { "completed" };
                Json(ProcessingAck {
                    status: status.to_string(),
                    job_id: Some("job-1".into()),
                    message: None,
                    error: (status == "failed").then(|| "empty trigger".to_string()),
                })
            }),
        );
        let forge = ForgeClient::new(serve(router).await, Duration::from_secs(5)).unwrap();

        let generated = TriggerGenerator::new(None)
            .generate(Uuid::new_v4(), Utc::now(), Utc::now())
            .await
            .unwrap();
        let ack = forge.process(&generated).await.unwrap();
        assert!(ack.is_completed());
        assert_eq!(ack.job_id.as_deref(), Some("job-1"));

        match forge.process(&TriggerDescriptor::minimal(Uuid::new_v4())).await {
            Err(CollaboratorError::Rejected(msg)) => assert_eq!(msg, "empty trigger"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_client_outcomes() {
        let router = Router::new().route(
            "/workflows/random",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                match q.get("cohort").map(String::as_str) {
                    Some("diligent4") => (
                        StatusCode::OK,
                        Json(serde_json::json!({
                            "workflow_id": "wf-1",
                            "workflow_data": { "title": "Onboarding" }
                        })),
                    ),
                    Some("odd") => (StatusCode::OK, Json(serde_json::json!({ "unexpected": true }))),
                    Some("broken") => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(serde_json::json!({ "error": "boom" })),
                    ),
                    _ => (StatusCode::NOT_FOUND, Json(serde_json::Value::Null)),
                }
            }),
        );
        let store = WorkflowStoreClient::new(serve(router).await, Duration::from_secs(5)).unwrap();

        let found = store.random_published_workflow("diligent4").await.unwrap().unwrap();
        assert_eq!(found.workflow_id.as_deref(), Some("wf-1"));
        assert!(store.random_published_workflow("odd").await.unwrap().is_none());
        assert!(store.random_published_workflow("empty").await.unwrap().is_none());
        assert!(matches!(
            store.random_published_workflow("broken").await,
            Err(CollaboratorError::ApiError(500, _))
        ));
    }
}
