//! Session lifecycle controller
//!
//! Owns the single session state machine:
//! IDLE → ACTIVE → STOPPING → PROCESSING → {READY, FALLBACK} → IDLE
//!
//! `stop()` hands the post-session pipeline to a background task and returns
//! immediately. Outcomes of that pipeline reach observers only through the
//! event bus; nothing is reported back to the caller of `stop()`.

use crate::models::{PipelineConfig, Session, SessionState, StateTransition};
use crate::services::collaborators::ProcessingCollaborators;
use crate::services::recording_agent::{AgentError, RecordingAgent};
use crate::services::step_sequencer::{
    publish_aborted, PipelineContext, PipelineOutcome, StepSequencer,
};
use chrono::{DateTime, Utc};
use flingoos_common::events::{EventBus, SessionEvent, WorkflowResult};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Session controller errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session already active (state: {0:?})")]
    AlreadyActive(SessionState),

    #[error("No active session to stop (state: {0:?})")]
    NoActiveSession(SessionState),

    #[error("Failed to start recording agent: {0}")]
    AgentStartFailed(#[source] AgentError),
}

impl SessionError {
    /// start/stop called in the wrong state
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            SessionError::AlreadyActive(_) | SessionError::NoActiveSession(_)
        )
    }
}

/// Read-only view of the controller
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    /// Recording in progress
    pub active: bool,
    pub state: SessionState,
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub agent_reachable: bool,
    pub has_result: bool,
}

#[derive(Default)]
struct ControllerState {
    session: Option<Session>,
    workflow: Option<WorkflowResult>,
}

impl ControllerState {
    fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, |s| s.state)
    }
}

struct Inner {
    agent: Arc<dyn RecordingAgent>,
    collaborators: Arc<dyn ProcessingCollaborators>,
    event_bus: EventBus,
    pipeline: PipelineConfig,
    state: Mutex<ControllerState>,
}

/// Session lifecycle controller
///
/// Cheap to clone; all clones drive the same state machine.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        agent: Arc<dyn RecordingAgent>,
        collaborators: Arc<dyn ProcessingCollaborators>,
        event_bus: EventBus,
        pipeline: PipelineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                agent,
                collaborators,
                event_bus,
                pipeline,
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Start a new session
    ///
    /// The state lock is held across the agent call, so concurrent starts
    /// cannot both succeed. On agent failure the controller stays idle and
    /// nothing is emitted.
    pub async fn start(&self) -> Result<Session, SessionError> {
        let mut guard = self.inner.state.lock().await;

        let current = guard.state();
        if current != SessionState::Idle {
            return Err(SessionError::AlreadyActive(current));
        }

        if let Err(e) = self.inner.agent.start_recording().await {
            tracing::error!(error = %e, "Recording agent failed to start");
            return Err(SessionError::AgentStartFailed(e));
        }

        let session = Session::start();
        log_transition(&StateTransition {
            session_id: session.id,
            old_state: SessionState::Idle,
            new_state: session.state,
            transitioned_at: session.started_at,
        });

        guard.workflow = None;
        guard.session = Some(session.clone());

        self.inner.event_bus.emit_lossy(SessionEvent::SessionStarted {
            session_id: session.id,
            started_at: session.started_at,
            timestamp: Utc::now(),
        });

        tracing::info!(session_id = %session.id, "Session started");
        Ok(session)
    }

    /// Stop the active session and launch the post-session pipeline
    ///
    /// The stopped event is emitted before this returns and before any
    /// progress of the cycle. Returns the stopped session's id.
    pub async fn stop(&self) -> Result<Uuid, SessionError> {
        let (session_id, started_at) = {
            let mut guard = self.inner.state.lock().await;
            let current = guard.state();

            let Some(session) = guard
                .session
                .as_mut()
                .filter(|s| s.state == SessionState::Active)
            else {
                return Err(SessionError::NoActiveSession(current));
            };

            log_transition(&session.transition_to(SessionState::Stopping));
            self.inner.event_bus.emit_lossy(SessionEvent::SessionStopped {
                session_id: session.id,
                timestamp: Utc::now(),
            });

            (session.id, session.started_at)
        };

        if let Err(e) = self.inner.agent.stop_recording().await {
            tracing::warn!(session_id = %session_id, error = %e, "Recording agent failed to stop, continuing");
        }
        let stopped_at = Utc::now();

        {
            let mut guard = self.inner.state.lock().await;
            if let Some(session) = guard.session.as_mut() {
                log_transition(&session.transition_to(SessionState::Processing));
            }
        }

        let context = PipelineContext {
            window_start: started_at,
            window_end: stopped_at,
            cohort_key: self.inner.pipeline.cohort_key.clone(),
        };
        tokio::spawn(run_pipeline(self.inner.clone(), session_id, context));

        tracing::info!(session_id = %session_id, "Session stopped, processing workflow");
        Ok(session_id)
    }

    /// Current state
    pub async fn state(&self) -> SessionState {
        self.inner.state.lock().await.state()
    }

    /// Status snapshot; the agent is probed after the state lock is released
    pub async fn status(&self) -> SessionStatus {
        let (state, session_id, started_at, has_result) = {
            let guard = self.inner.state.lock().await;
            (
                guard.state(),
                guard.session.as_ref().map(|s| s.id),
                guard.session.as_ref().map(|s| s.started_at),
                guard.workflow.is_some(),
            )
        };

        let agent_reachable = self.inner.agent.is_reachable().await;

        SessionStatus {
            active: state == SessionState::Active,
            state,
            session_id,
            started_at,
            agent_reachable,
            has_result,
        }
    }

    /// Result of the most recent completed cycle, if any
    pub async fn current_result(&self) -> Option<WorkflowResult> {
        self.inner.state.lock().await.workflow.clone()
    }
}

/// Background body launched by `stop()`
async fn run_pipeline(inner: Arc<Inner>, session_id: Uuid, context: PipelineContext) {
    let sequencer = StepSequencer::new(inner.collaborators.clone(), inner.event_bus.clone());
    let steps = inner.pipeline.step_plan();
    let progress = sequencer.progress();

    // Nested task so a panicking collaborator surfaces as a JoinError
    let outcome = match tokio::spawn(async move { sequencer.run(session_id, &steps, context).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Pipeline task aborted, using fallback result");
            publish_aborted(
                &inner.event_bus,
                session_id,
                &progress,
                format!("Pipeline aborted: {}", e),
            )
            .await;
            PipelineOutcome::fallback()
        }
    };

    let final_state = if outcome.workflow.is_fallback() {
        SessionState::Fallback
    } else {
        SessionState::Ready
    };

    {
        let mut guard = inner.state.lock().await;
        if let Some(session) = guard.session.as_mut() {
            log_transition(&session.transition_to(final_state));
        }
        guard.workflow = Some(outcome.workflow);
    }

    let delay = inner.pipeline.completion_delay();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut guard = inner.state.lock().await;
    let workflow = guard.workflow.clone();
    let has_result = workflow.is_some();
    let timestamp = Utc::now();

    let event = match final_state {
        SessionState::Ready => SessionEvent::SessionReady {
            session_id,
            has_result,
            workflow,
            timestamp,
        },
        _ => SessionEvent::SessionFallback {
            session_id,
            has_result,
            workflow,
            timestamp,
        },
    };
    inner.event_bus.emit_lossy(event);

    if let Some(mut session) = guard.session.take() {
        log_transition(&session.transition_to(SessionState::Idle));
    }

    tracing::info!(session_id = %session_id, outcome = ?final_state, "Session cycle complete");
}

fn log_transition(transition: &StateTransition) {
    tracing::info!(
        session_id = %transition.session_id,
        old_state = ?transition.old_state,
        new_state = ?transition.new_state,
        transitioned_at = %transition.transitioned_at,
        "Session state changed"
    );
}
