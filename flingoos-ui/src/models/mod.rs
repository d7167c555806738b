//! Data models for flingoos-ui (session lifecycle service)
//!
//! - Session lifecycle state machine
//! - Post-session pipeline plan and progress tracking

pub mod pipeline;
pub mod session;

pub use pipeline::{CollaboratorAction, PipelineConfig, ProgressTracker, StepSpec};
pub use session::{Session, SessionState, StateTransition};
