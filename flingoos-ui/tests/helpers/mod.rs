//! Shared test doubles for flingoos-ui integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flingoos_common::config::PipelineTimings;
use flingoos_common::events::{EventBus, SessionEvent, WorkflowResult};
use flingoos_ui::models::PipelineConfig;
use flingoos_ui::services::{
    AgentError, CollaboratorError, ProcessingAck, ProcessingCollaborators, RecordingAgent,
    SessionController, TriggerDescriptor,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use uuid::Uuid;

/// Recording agent whose answers are set by the test
#[derive(Default)]
pub struct ScriptedAgent {
    pub fail_start: AtomicBool,
    pub fail_stop: AtomicBool,
    pub unreachable: AtomicBool,
    pub start_calls: AtomicUsize,
    pub stop_calls: AtomicUsize,
}

impl ScriptedAgent {
    pub fn failing_start() -> Self {
        let agent = Self::default();
        agent.fail_start.store(true, Ordering::SeqCst);
        agent
    }

    pub fn failing_stop() -> Self {
        let agent = Self::default();
        agent.fail_stop.store(true, Ordering::SeqCst);
        agent
    }
}

#[async_trait]
impl RecordingAgent for ScriptedAgent {
    async fn start_recording(&self) -> Result<(), AgentError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(AgentError::NetworkError("connection refused".into()));
        }
        Ok(())
    }

    async fn stop_recording(&self) -> Result<(), AgentError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(AgentError::Rejected("not recording".into()));
        }
        Ok(())
    }

    async fn is_reachable(&self) -> bool {
        !self.unreachable.load(Ordering::SeqCst)
    }
}

/// What `retrieve_result` does
#[derive(Clone)]
pub enum Retrieval {
    Found(WorkflowResult),
    Absent,
    Fail,
    Panic,
}

/// Collaborators whose outcomes are set by the test
pub struct ScriptedCollaborators {
    pub fail_trigger: bool,
    pub fail_processing: bool,
    pub retrieval: Retrieval,
    pub calls: Mutex<Vec<&'static str>>,
    pub descriptors: Mutex<Vec<TriggerDescriptor>>,
}

impl ScriptedCollaborators {
    pub fn succeeding() -> Self {
        Self::with_retrieval(Retrieval::Found(sample_workflow()))
    }

    pub fn with_retrieval(retrieval: Retrieval) -> Self {
        Self {
            fail_trigger: false,
            fail_processing: false,
            retrieval,
            calls: Mutex::new(Vec::new()),
            descriptors: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessingCollaborators for ScriptedCollaborators {
    async fn generate_trigger(
        &self,
        session_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<TriggerDescriptor, CollaboratorError> {
        self.calls.lock().unwrap().push("generate_trigger");
        if self.fail_trigger {
            return Err(CollaboratorError::Io("permission denied".into()));
        }
        let mut descriptor = TriggerDescriptor::minimal(session_id);
        descriptor.window_start = Some(window_start);
        descriptor.window_end = Some(window_end);
        descriptor.payload = serde_json::json!({ "scripted": true });
        Ok(descriptor)
    }

    async fn trigger_processing(
        &self,
        descriptor: &TriggerDescriptor,
    ) -> Result<ProcessingAck, CollaboratorError> {
        self.calls.lock().unwrap().push("trigger_processing");
        self.descriptors.lock().unwrap().push(descriptor.clone());
        if self.fail_processing {
            return Err(CollaboratorError::ApiError(502, "forge unavailable".into()));
        }
        Ok(ProcessingAck {
            status: "completed".into(),
            job_id: Some("job-42".into()),
            message: None,
            error: None,
        })
    }

    async fn retrieve_result(
        &self,
        _cohort_key: &str,
    ) -> Result<Option<WorkflowResult>, CollaboratorError> {
        self.calls.lock().unwrap().push("retrieve_result");
        match &self.retrieval {
            Retrieval::Found(workflow) => Ok(Some(workflow.clone())),
            Retrieval::Absent => Ok(None),
            Retrieval::Fail => Err(CollaboratorError::NetworkError("store timeout".into())),
            Retrieval::Panic => panic!("result store client crashed"),
        }
    }
}

pub fn sample_workflow() -> WorkflowResult {
    WorkflowResult::real(
        "Weekly report assembly",
        "wf-2024-117",
        0.73,
        "# Weekly report\n\n1. Export data",
        Some("https://console.example/wf-2024-117".to_string()),
    )
}

/// Controller with zero step durations and its bus
pub fn build_controller(
    agent: Arc<ScriptedAgent>,
    collaborators: Arc<ScriptedCollaborators>,
) -> (SessionController, EventBus) {
    let bus = EventBus::new(256);
    let controller = SessionController::new(
        agent,
        collaborators,
        bus.clone(),
        PipelineConfig::new(PipelineTimings::immediate(), "test-cohort"),
    );
    (controller, bus)
}

/// Collect events until the cycle's final event, or panic after 5 seconds
pub async fn collect_until_terminal(rx: &mut Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            let done = event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .expect("timed out waiting for final session event");
    events
}

/// Poll until the controller is idle again
pub async fn wait_for_idle(controller: &SessionController) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.state().await != flingoos_ui::models::SessionState::Idle {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("controller did not return to idle");
}
