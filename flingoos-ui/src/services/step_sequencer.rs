//! Post-session step sequencer
//!
//! Runs the declared [`StepSpec`] plan strictly in order. Every status change
//! is broadcast as a `ProgressUpdate` carrying the cumulative snapshot.
//!
//! # Step semantics
//! - **Placeholder**: running → sleep for the configured duration → completed
//! - **Action**: running → collaborator call awaited inline → completed, even
//!   when the call failed (the failure is logged and kept in `detail`)
//!
//! After the last step a final snapshot with `is_active = false` is emitted.
//! The tracker is shared through [`StepSequencer::progress`] so a run that
//! dies mid-step can still be closed out by its owner.

use crate::models::{CollaboratorAction, ProgressTracker, StepSpec};
use crate::services::collaborators::{ProcessingCollaborators, TriggerDescriptor};
use chrono::{DateTime, Utc};
use flingoos_common::events::{EventBus, ProgressSnapshot, SessionEvent, WorkflowResult};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Inputs for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Recording window start (session start time)
    pub window_start: DateTime<Utc>,
    /// Recording window end (stop time)
    pub window_end: DateTime<Utc>,
    /// Result-store partition to query
    pub cohort_key: String,
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Always populated; the fallback result when retrieval yielded nothing
    pub workflow: WorkflowResult,
    /// Labels of action steps whose collaborator call failed
    pub failed_actions: Vec<String>,
}

impl PipelineOutcome {
    /// Outcome used when the run could not complete at all
    pub fn fallback() -> Self {
        Self {
            workflow: WorkflowResult::fallback(),
            failed_actions: Vec::new(),
        }
    }
}

/// Step sequencer service
pub struct StepSequencer {
    collaborators: Arc<dyn ProcessingCollaborators>,
    event_bus: EventBus,
    progress: Arc<Mutex<ProgressTracker>>,
}

impl StepSequencer {
    pub fn new(collaborators: Arc<dyn ProcessingCollaborators>, event_bus: EventBus) -> Self {
        Self {
            collaborators,
            event_bus,
            progress: Arc::new(Mutex::new(ProgressTracker::new())),
        }
    }

    /// Handle on the tracker of the current run
    pub fn progress(&self) -> Arc<Mutex<ProgressTracker>> {
        self.progress.clone()
    }

    /// Execute `steps` for `session_id`, one at a time
    pub async fn run(
        &self,
        session_id: Uuid,
        steps: &[StepSpec],
        context: PipelineContext,
    ) -> PipelineOutcome {
        let started = std::time::Instant::now();
        tracing::info!(session_id = %session_id, steps = steps.len(), "Starting post-session pipeline");

        *self.progress.lock().await = ProgressTracker::new();
        let mut run = RunState::default();

        for spec in steps {
            let snapshot = self.progress.lock().await.begin(spec);
            tracing::info!(session_id = %session_id, step = %spec.label(), "Step running");
            self.publish(session_id, snapshot);

            let detail = match spec {
                StepSpec::Placeholder { duration, .. } => {
                    if !duration.is_zero() {
                        tokio::time::sleep(*duration).await;
                    }
                    None
                }
                StepSpec::Action { label, action } => {
                    let detail = self
                        .perform(session_id, *action, &context, &mut run)
                        .await;
                    if detail.is_some() {
                        run.failed_actions.push(label.clone());
                    }
                    detail
                }
            };

            let snapshot = self.progress.lock().await.complete(detail);
            tracing::info!(session_id = %session_id, step = %spec.label(), "Step completed");
            self.publish(session_id, snapshot);
        }

        let snapshot = self.progress.lock().await.finish();
        self.publish(session_id, snapshot);

        let workflow = run.workflow.unwrap_or_else(|| {
            tracing::info!(session_id = %session_id, "No workflow retrieved, using fallback result");
            WorkflowResult::fallback()
        });

        tracing::info!(
            session_id = %session_id,
            origin = ?workflow.origin,
            failed_actions = run.failed_actions.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Post-session pipeline finished"
        );

        PipelineOutcome {
            workflow,
            failed_actions: run.failed_actions,
        }
    }

    /// Invoke one collaborator; returns the failure note, if any
    async fn perform(
        &self,
        session_id: Uuid,
        action: CollaboratorAction,
        context: &PipelineContext,
        run: &mut RunState,
    ) -> Option<String> {
        match action {
            CollaboratorAction::GenerateTrigger => {
                match self
                    .collaborators
                    .generate_trigger(session_id, context.window_start, context.window_end)
                    .await
                {
                    Ok(descriptor) => {
                        run.descriptor = Some(descriptor);
                        None
                    }
                    Err(e) => {
                        tracing::error!(session_id = %session_id, error = %e, "Trigger generation failed");
                        Some(e.to_string())
                    }
                }
            }
            CollaboratorAction::TriggerProcessing => {
                let descriptor = run
                    .descriptor
                    .clone()
                    .unwrap_or_else(|| TriggerDescriptor::minimal(session_id));
                match self.collaborators.trigger_processing(&descriptor).await {
                    Ok(ack) => {
                        tracing::info!(
                            session_id = %session_id,
                            job_id = ack.job_id.as_deref().unwrap_or("-"),
                            "Remote processing acknowledged"
                        );
                        None
                    }
                    Err(e) => {
                        tracing::error!(session_id = %session_id, error = %e, "Remote processing trigger failed");
                        Some(e.to_string())
                    }
                }
            }
            CollaboratorAction::RetrieveResult => {
                match self.collaborators.retrieve_result(&context.cohort_key).await {
                    Ok(Some(workflow)) => {
                        run.workflow = Some(workflow);
                        None
                    }
                    // Absence is a normal outcome
                    Ok(None) => None,
                    Err(e) => {
                        tracing::error!(session_id = %session_id, error = %e, "Workflow retrieval failed");
                        Some(e.to_string())
                    }
                }
            }
        }
    }

    fn publish(&self, session_id: Uuid, snapshot: ProgressSnapshot) {
        publish_progress(&self.event_bus, session_id, snapshot);
    }
}

/// Close out a run that ended without reaching its final snapshot
///
/// The running step, if any, is marked failed with `reason`, then the
/// terminal snapshot is published.
pub async fn publish_aborted(
    event_bus: &EventBus,
    session_id: Uuid,
    progress: &Mutex<ProgressTracker>,
    reason: String,
) {
    let mut tracker = progress.lock().await;
    if let Some(snapshot) = tracker.fail(reason) {
        publish_progress(event_bus, session_id, snapshot);
    }
    publish_progress(event_bus, session_id, tracker.finish());
}

fn publish_progress(event_bus: &EventBus, session_id: Uuid, snapshot: ProgressSnapshot) {
    event_bus.emit_lossy(SessionEvent::ProgressUpdate {
        session_id,
        snapshot,
        timestamp: Utc::now(),
    });
}

/// Values carried between action steps of one run
#[derive(Default)]
struct RunState {
    descriptor: Option<TriggerDescriptor>,
    workflow: Option<WorkflowResult>,
    failed_actions: Vec<String>,
}
