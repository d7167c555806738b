//! Event types for the Flingoos event system
//!
//! Provides shared session event definitions and the EventBus notification
//! hub used by every transport (SSE, log sink, in-process observers).

// Sub-modules (supporting types)
mod session_types;
pub mod observer;

pub use observer::{attach_observer, LogObserver, ObserverError, SessionObserver};
pub use session_types::{
    ProgressSnapshot, ResultOrigin, Step, StepKind, StepStatus, WorkflowResult,
    PROCESSING_COMPLETE_LABEL,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Session event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Every cycle produces, in order: `SessionStarted`, `SessionStopped`, a run
/// of `ProgressUpdate`s, then exactly one of `SessionReady` /
/// `SessionFallback`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Recording agent started and a new session is active
    SessionStarted {
        session_id: Uuid,
        started_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// Session stopped; emitted before any progress of the same cycle
    SessionStopped {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Pipeline step transition
    ProgressUpdate {
        session_id: Uuid,
        snapshot: ProgressSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// Pipeline finished with a result from the result store
    SessionReady {
        session_id: Uuid,
        has_result: bool,
        workflow: Option<WorkflowResult>,
        timestamp: DateTime<Utc>,
    },

    /// Pipeline finished with the fallback result
    SessionFallback {
        session_id: Uuid,
        has_result: bool,
        workflow: Option<WorkflowResult>,
        timestamp: DateTime<Utc>,
    },
}

/// Lifecycle classification of a session event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    Started,
    Stopped,
    Ready,
    Fallback,
}

impl SessionEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            SessionEvent::SessionStarted { .. } => "SessionStarted",
            SessionEvent::SessionStopped { .. } => "SessionStopped",
            SessionEvent::ProgressUpdate { .. } => "ProgressUpdate",
            SessionEvent::SessionReady { .. } => "SessionReady",
            SessionEvent::SessionFallback { .. } => "SessionFallback",
        }
    }

    /// Session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            SessionEvent::SessionStarted { session_id, .. }
            | SessionEvent::SessionStopped { session_id, .. }
            | SessionEvent::ProgressUpdate { session_id, .. }
            | SessionEvent::SessionReady { session_id, .. }
            | SessionEvent::SessionFallback { session_id, .. } => *session_id,
        }
    }

    /// `None` for progress updates
    pub fn lifecycle_kind(&self) -> Option<LifecycleKind> {
        match self {
            SessionEvent::SessionStarted { .. } => Some(LifecycleKind::Started),
            SessionEvent::SessionStopped { .. } => Some(LifecycleKind::Stopped),
            SessionEvent::ProgressUpdate { .. } => None,
            SessionEvent::SessionReady { .. } => Some(LifecycleKind::Ready),
            SessionEvent::SessionFallback { .. } => Some(LifecycleKind::Fallback),
        }
    }

    /// Final event of a cycle (ready or fallback)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::SessionReady { .. } | SessionEvent::SessionFallback { .. }
        )
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus (the notification hub)
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// There is no replay: a receiver only sees events emitted after it
/// subscribed. A subscriber that falls more than `capacity` events behind
/// receives `RecvError::Lagged` and resumes from the oldest retained event.
///
/// # Examples
///
/// ```
/// use flingoos_common::events::{EventBus, SessionEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// let session_id = uuid::Uuid::new_v4();
/// event_bus.emit_lossy(SessionEvent::SessionStopped {
///     session_id,
///     timestamp: chrono::Utc::now(),
/// });
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.session_id(), session_id);
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer per subscriber before the
    ///   oldest are dropped for that subscriber. Must be greater than zero.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SessionEvent,
    ) -> Result<usize, broadcast::error::SendError<SessionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SessionEvent) {
        let event_type = event.event_type().to_string();
        if self.tx.send(event).is_err() {
            tracing::trace!(event_type = %event_type, "No subscribers for event");
        }
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopped(session_id: Uuid) -> SessionEvent {
        SessionEvent::SessionStopped {
            session_id,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let id = Uuid::new_v4();
        let json = serde_json::to_value(stopped(id)).unwrap();

        assert_eq!(json["type"], "SessionStopped");
        assert_eq!(json["session_id"], id.to_string());
    }

    #[test]
    fn test_lifecycle_kind_and_terminal() {
        let id = Uuid::new_v4();
        let progress = SessionEvent::ProgressUpdate {
            session_id: id,
            snapshot: ProgressSnapshot {
                current_step_label: "Uploading audio...".into(),
                is_active: true,
                steps: vec![],
            },
            timestamp: Utc::now(),
        };
        let ready = SessionEvent::SessionReady {
            session_id: id,
            has_result: true,
            workflow: Some(WorkflowResult::fallback()),
            timestamp: Utc::now(),
        };

        assert_eq!(progress.lifecycle_kind(), None);
        assert!(!progress.is_terminal());
        assert_eq!(stopped(id).lifecycle_kind(), Some(LifecycleKind::Stopped));
        assert_eq!(ready.lifecycle_kind(), Some(LifecycleKind::Ready));
        assert!(ready.is_terminal());
        assert_eq!(ready.event_type(), "SessionReady");
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_events_in_order() {
        let bus = EventBus::new(16);
        let mut rx_a = bus.subscribe();
        let mut rx_b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        bus.emit(stopped(first)).unwrap();
        bus.emit(stopped(second)).unwrap();

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(rx.recv().await.unwrap().session_id(), first);
            assert_eq!(rx.recv().await.unwrap().session_id(), second);
        }
    }

    #[test]
    fn test_late_subscriber_gets_no_replay() {
        let bus = EventBus::new(16);
        let _early = bus.subscribe();
        bus.emit_lossy(stopped(Uuid::new_v4()));

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert!(bus.emit(stopped(Uuid::new_v4())).is_err());
        // Must not panic
        bus.emit_lossy(stopped(Uuid::new_v4()));
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_slow_subscriber_does_not_block_emit() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();

        for _ in 0..10 {
            bus.emit_lossy(stopped(Uuid::new_v4()));
        }

        assert!(matches!(
            slow.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(8))
        ));
    }
}
