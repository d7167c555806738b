//! Session pipeline type definitions
//!
//! Payload types carried by session events: per-step progress and the
//! workflow result produced at the end of a processing cycle.

use serde::{Deserialize, Serialize};

/// Label used by the final snapshot of a pipeline run
pub const PROCESSING_COMPLETE_LABEL: &str = "Processing complete";

/// Whether a step only paces the progress feed or does real work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Fixed delay standing in for work that is not otherwise observable
    Placeholder,
    /// Invokes one of the processing collaborators
    Action,
}

/// Lifecycle of a single pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    /// The run was cut short while this step was running; the cause is in
    /// `detail`. A collaborator that merely returns an error still completes.
    Failed,
}

/// One unit of the post-stop pipeline as seen by observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub label: String,
    pub kind: StepKind,
    pub status: StepStatus,
    /// Collaborator failure message when an action step degraded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Step {
    pub fn new(label: impl Into<String>, kind: StepKind) -> Self {
        Self {
            label: label.into(),
            kind,
            status: StepStatus::Pending,
            detail: None,
        }
    }
}

/// Cumulative, append-only view of step statuses
///
/// Completed steps are never removed or reordered. The final snapshot of a
/// run has `is_active == false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub current_step_label: String,
    pub is_active: bool,
    pub steps: Vec<Step>,
}

impl ProgressSnapshot {
    /// Labels of all completed steps, oldest first
    pub fn completed_labels(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.label.as_str())
            .collect()
    }

    /// The step currently marked running, if any
    pub fn running_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.status == StepStatus::Running)
    }
}

/// Where a workflow result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    /// Retrieved from the result store
    Real,
    /// Deterministic placeholder used when retrieval failed or found nothing
    Fallback,
}

/// Outcome of the processing pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub title: String,
    pub external_id: String,
    /// Productivity score, 0.0 - 1.0
    pub score: f64,
    /// Markdown guide, possibly empty
    pub guide_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_link: Option<String>,
    pub origin: ResultOrigin,
}

const FALLBACK_TITLE: &str = "Sample Workflow";
const FALLBACK_ID: &str = "fallback-001";
const FALLBACK_SCORE: f64 = 0.85;
const FALLBACK_GUIDE: &str = "# Sample Workflow Guide\n\n\
This is a fallback workflow when Firestore data is not available.\n\n\
## Steps\n\
1. Review the session data\n\
2. Analyze patterns\n\
3. Generate insights";

impl WorkflowResult {
    /// Build a result retrieved from the store
    ///
    /// Score is clamped to 0.0 - 1.0 and an empty link is dropped.
    pub fn real(
        title: impl Into<String>,
        external_id: impl Into<String>,
        score: f64,
        guide_content: impl Into<String>,
        result_link: Option<String>,
    ) -> Self {
        let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            title: title.into(),
            external_id: external_id.into(),
            score,
            guide_content: guide_content.into(),
            result_link: result_link.filter(|link| !link.trim().is_empty()),
            origin: ResultOrigin::Real,
        }
    }

    /// The deterministic placeholder result
    pub fn fallback() -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            external_id: FALLBACK_ID.to_string(),
            score: FALLBACK_SCORE,
            guide_content: FALLBACK_GUIDE.to_string(),
            result_link: None,
            origin: ResultOrigin::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == ResultOrigin::Fallback
    }
}
