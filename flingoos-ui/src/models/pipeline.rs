//! Post-session pipeline plan and progress tracking
//!
//! The pipeline is a fixed, ordered list of [`StepSpec`]s. Placeholder steps
//! pace the progress feed with a configured delay; action steps invoke one of
//! the processing collaborators.

use flingoos_common::config::PipelineTimings;
use flingoos_common::events::{
    ProgressSnapshot, Step, StepKind, StepStatus, PROCESSING_COMPLETE_LABEL,
};
use std::time::Duration;

pub const FLUSH_LABEL: &str = "Starting data flush...";
pub const UPLOAD_AUDIO_LABEL: &str = "Uploading audio...";
pub const UPLOAD_SCREENSHOTS_LABEL: &str = "Uploading screenshots...";
pub const UPLOAD_TELEMETRY_LABEL: &str = "Uploading telemetry (mouse, keyboard, window changes)...";
pub const VERIFY_UPLOADS_LABEL: &str = "Verifying uploads...";
pub const GENERATE_TRIGGER_LABEL: &str = "Generating forge trigger JSON...";
pub const TRIGGER_PROCESSING_LABEL: &str = "Triggering forge processing pipeline...";
pub const PROCESSING_WAIT_LABEL: &str = "Processing workflow (stages A-F)...";
pub const PERSIST_RESULTS_LABEL: &str = "Uploading results to Firestore...";
pub const RETRIEVE_WORKFLOW_LABEL: &str = "Retrieving processed workflow...";

/// Collaborator operation bound to an action step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaboratorAction {
    GenerateTrigger,
    TriggerProcessing,
    RetrieveResult,
}

/// One declared step of the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepSpec {
    Placeholder { label: String, duration: Duration },
    Action { label: String, action: CollaboratorAction },
}

impl StepSpec {
    pub fn placeholder(label: &str, millis: u64) -> Self {
        StepSpec::Placeholder {
            label: label.to_string(),
            duration: Duration::from_millis(millis),
        }
    }

    pub fn action(label: &str, action: CollaboratorAction) -> Self {
        StepSpec::Action {
            label: label.to_string(),
            action,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            StepSpec::Placeholder { label, .. } | StepSpec::Action { label, .. } => label,
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            StepSpec::Placeholder { .. } => StepKind::Placeholder,
            StepSpec::Action { .. } => StepKind::Action,
        }
    }
}

/// Pipeline settings owned by the controller
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub timings: PipelineTimings,
    /// Result-store partition passed to `retrieve_result`
    pub cohort_key: String,
}

impl PipelineConfig {
    pub fn new(timings: PipelineTimings, cohort_key: impl Into<String>) -> Self {
        Self {
            timings,
            cohort_key: cohort_key.into(),
        }
    }

    /// The fixed ten-step plan used by every run
    pub fn step_plan(&self) -> Vec<StepSpec> {
        let t = &self.timings;
        vec![
            StepSpec::placeholder(FLUSH_LABEL, t.flush_ms),
            StepSpec::placeholder(UPLOAD_AUDIO_LABEL, t.upload_audio_ms),
            StepSpec::placeholder(UPLOAD_SCREENSHOTS_LABEL, t.upload_screenshots_ms),
            StepSpec::placeholder(UPLOAD_TELEMETRY_LABEL, t.upload_telemetry_ms),
            StepSpec::placeholder(VERIFY_UPLOADS_LABEL, t.verify_uploads_ms),
            StepSpec::action(GENERATE_TRIGGER_LABEL, CollaboratorAction::GenerateTrigger),
            StepSpec::action(TRIGGER_PROCESSING_LABEL, CollaboratorAction::TriggerProcessing),
            StepSpec::placeholder(PROCESSING_WAIT_LABEL, t.processing_wait_ms),
            StepSpec::placeholder(PERSIST_RESULTS_LABEL, t.persist_results_ms),
            StepSpec::action(RETRIEVE_WORKFLOW_LABEL, CollaboratorAction::RetrieveResult),
        ]
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.timings.completion_delay_ms)
    }
}

/// Builds the append-only snapshots for one pipeline run
///
/// At most one step is running at a time and it is always the last one.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    steps: Vec<Step>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `spec` as running
    pub fn begin(&mut self, spec: &StepSpec) -> ProgressSnapshot {
        debug_assert!(
            self.steps.last().map_or(true, |s| s.status != StepStatus::Running),
            "previous step still running"
        );
        let mut step = Step::new(spec.label(), spec.kind());
        step.status = StepStatus::Running;
        self.steps.push(step);
        self.snapshot(spec.label(), true)
    }

    /// Mark the running step completed, with an optional degradation note
    pub fn complete(&mut self, detail: Option<String>) -> ProgressSnapshot {
        let label = match self.steps.last_mut() {
            Some(step) if step.status == StepStatus::Running => {
                step.status = StepStatus::Completed;
                step.detail = detail;
                step.label.clone()
            }
            _ => String::new(),
        };
        self.snapshot(&label, true)
    }

    /// Mark the running step failed after the run was cut short
    ///
    /// Returns `None` when no step is running.
    pub fn fail(&mut self, detail: String) -> Option<ProgressSnapshot> {
        let step = self
            .steps
            .last_mut()
            .filter(|s| s.status == StepStatus::Running)?;
        step.status = StepStatus::Failed;
        step.detail = Some(detail);
        let label = step.label.clone();
        Some(self.snapshot(&label, true))
    }

    /// Terminal snapshot; nothing may follow it
    pub fn finish(&self) -> ProgressSnapshot {
        self.snapshot(PROCESSING_COMPLETE_LABEL, false)
    }

    fn snapshot(&self, current: &str, is_active: bool) -> ProgressSnapshot {
        ProgressSnapshot {
            current_step_label: current.to_string(),
            is_active,
            steps: self.steps.clone(),
        }
    }
}
