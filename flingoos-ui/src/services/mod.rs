//! Service modules for the session lifecycle
//!
//! - `session_controller`: session state machine and cycle ownership
//! - `step_sequencer`: ordered execution of the post-session pipeline
//! - `recording_agent`: contract and HTTP client for the recording agent
//! - `collaborators`: processing collaborator facade and its adapters

pub mod collaborators;
pub mod recording_agent;
pub mod session_controller;
pub mod step_sequencer;

pub use collaborators::{
    CollaboratorError, ForgeClient, ProcessingAck, ProcessingCollaborators, ServiceCollaborators,
    StoredWorkflow, TriggerDescriptor, TriggerGenerator, WorkflowStoreClient,
};
pub use recording_agent::{AgentError, BridgeClient, RecordingAgent};
pub use session_controller::{SessionController, SessionError, SessionStatus};
pub use step_sequencer::{PipelineContext, PipelineOutcome, StepSequencer};
