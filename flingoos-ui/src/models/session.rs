//! Session lifecycle state machine
//!
//! A session moves through:
//! IDLE → ACTIVE → STOPPING → PROCESSING → {READY, FALLBACK} → IDLE

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    /// No session; ready to start
    Idle,
    /// Recording agent is capturing
    Active,
    /// Stop requested, agent being stopped
    Stopping,
    /// Post-session pipeline running
    Processing,
    /// Pipeline finished with a real workflow
    Ready,
    /// Pipeline finished with the fallback workflow
    Fallback,
}

impl SessionState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Active)
                | (Active, Stopping)
                | (Stopping, Processing)
                | (Processing, Ready)
                | (Processing, Fallback)
                | (Ready, Idle)
                | (Fallback, Idle)
        )
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: SessionState,
    pub new_state: SessionState,
    pub transitioned_at: DateTime<Utc>,
}

/// One recording-to-workflow cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub id: Uuid,

    /// When the recording agent was started
    pub started_at: DateTime<Utc>,

    /// Current lifecycle state
    pub state: SessionState,
}

impl Session {
    /// Create a session that has just become active
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: SessionState::Active,
        }
    }

    /// Transition to new state
    ///
    /// Transitions are driven only by the controller, which checks the
    /// current state first; an illegal transition is a programming error.
    pub fn transition_to(&mut self, new_state: SessionState) -> StateTransition {
        debug_assert!(
            self.state.can_transition_to(new_state),
            "illegal session transition {:?} -> {:?}",
            self.state,
            new_state
        );

        let transition = StateTransition {
            session_id: self.id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        tracing::debug!(
            session_id = %self.id,
            old_state = ?transition.old_state,
            new_state = ?transition.new_state,
            "Session state transition"
        );

        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_active() {
        let session = Session::start();
        assert_eq!(session.state, SessionState::Active);
        assert!(session.state.can_transition_to(SessionState::Stopping));
    }

    #[test]
    fn test_full_cycle_transitions() {
        let mut session = Session::start();

        for next in [
            SessionState::Stopping,
            SessionState::Processing,
            SessionState::Fallback,
        ] {
            let transition = session.transition_to(next);
            assert_eq!(transition.new_state, next);
            assert_eq!(transition.session_id, session.id);
        }

        assert_eq!(session.state, SessionState::Fallback);
        assert!(session.state.can_transition_to(SessionState::Idle));
    }

    #[test]
    fn test_illegal_transitions() {
        use SessionState::*;
        assert!(!Idle.can_transition_to(Stopping));
        assert!(!Idle.can_transition_to(Processing));
        assert!(!Active.can_transition_to(Active));
        assert!(!Active.can_transition_to(Idle));
        assert!(!Processing.can_transition_to(Idle));
        assert!(!Ready.can_transition_to(Active));
    }

    #[test]
    fn test_state_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&SessionState::Processing).unwrap(),
            "\"PROCESSING\""
        );
    }
}
