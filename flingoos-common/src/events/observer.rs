//! Observer attachment for the EventBus
//!
//! Any transport (push channel, polling cache, log sink) can receive session
//! events by implementing [`SessionObserver`] and attaching it to the bus.
//! Each observer runs on its own task, so a slow or failing observer never
//! blocks emission or other observers.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{EventBus, ProgressSnapshot, SessionEvent};

/// Delivery failure reported by an observer
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Observer transport closed: {0}")]
    Closed(String),

    #[error("Observer delivery failed: {0}")]
    Delivery(String),
}

/// Receiver of session progress and lifecycle events
#[async_trait]
pub trait SessionObserver: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Called for every pipeline step transition
    async fn on_progress(
        &self,
        session_id: Uuid,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), ObserverError>;

    /// Called for started, stopped, ready and fallback events
    async fn on_lifecycle(&self, event: &SessionEvent) -> Result<(), ObserverError>;
}

/// Subscribe `observer` to `bus` and drive it on a background task
///
/// The subscription is taken before this function returns, so every event
/// emitted afterwards is delivered. Observer errors are logged and delivery
/// continues; a lagging observer skips the dropped events with a warning.
/// The task ends when the bus is dropped or the observer reports
/// [`ObserverError::Closed`].
pub fn attach_observer<O>(bus: &EventBus, observer: O) -> JoinHandle<()>
where
    O: SessionObserver + 'static,
{
    let mut rx = bus.subscribe();

    tokio::spawn(async move {
        debug!(observer = observer.name(), "Observer attached");

        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        observer = observer.name(),
                        skipped,
                        "Observer lagging behind, events dropped"
                    );
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let delivered = match &event {
                SessionEvent::ProgressUpdate {
                    session_id,
                    snapshot,
                    ..
                } => observer.on_progress(*session_id, snapshot).await,
                lifecycle => observer.on_lifecycle(lifecycle).await,
            };

            match delivered {
                Ok(()) => {}
                Err(ObserverError::Closed(reason)) => {
                    info!(observer = observer.name(), reason = %reason, "Observer closed");
                    break;
                }
                Err(e) => {
                    warn!(
                        observer = observer.name(),
                        event_type = event.event_type(),
                        error = %e,
                        "Observer delivery failed"
                    );
                }
            }
        }

        debug!(observer = observer.name(), "Observer detached");
    })
}

/// Observer that writes every event to the tracing log
pub struct LogObserver;

#[async_trait]
impl SessionObserver for LogObserver {
    fn name(&self) -> &str {
        "log"
    }

    async fn on_progress(
        &self,
        session_id: Uuid,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), ObserverError> {
        info!(
            session_id = %session_id,
            step = %snapshot.current_step_label,
            active = snapshot.is_active,
            completed = snapshot.completed_labels().len(),
            "Session progress"
        );
        Ok(())
    }

    async fn on_lifecycle(&self, event: &SessionEvent) -> Result<(), ObserverError> {
        info!(
            session_id = %event.session_id(),
            event_type = event.event_type(),
            "Session lifecycle"
        );
        Ok(())
    }
}
