//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE implementations for Flingoos services.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::events::{EventBus, SessionEvent};

/// Heartbeat interval for SSE connections
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serialize a session event into an SSE frame
///
/// The SSE event name is [`SessionEvent::event_type`], the data is the JSON
/// form of the event.
pub fn to_sse_event(event: &SessionEvent) -> Result<Event, serde_json::Error> {
    let json = serde_json::to_string(event)?;
    Ok(Event::default().event(event.event_type()).data(json))
}

/// Create an SSE stream forwarding every session event on `bus`
///
/// Starts with a `ConnectionStatus: connected` frame, then relays events in
/// emission order with a heartbeat comment every 15 seconds. A client that
/// falls behind skips the dropped events and keeps streaming. The stream ends
/// when the bus is dropped.
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     flingoos_common::sse::create_session_sse_stream("flingoos-ui", &state.event_bus)
/// }
/// ```
pub fn create_session_sse_stream(
    service_name: &'static str,
    bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before returning so no event between handshake and first poll is lost
    let mut rx = bus.subscribe();
    info!(
        subscribers = bus.subscriber_count(),
        "New SSE client connected to {} session events", service_name
    );

    let stream = async_stream::stream! {
        debug!("SSE: {} event stream started", service_name);

        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => match to_sse_event(&event) {
                            Ok(frame) => {
                                debug!("SSE: Broadcasting event: {}", event.event_type());
                                yield Ok(frame);
                            }
                            Err(e) => {
                                warn!("SSE: Failed to serialize event {}: {}", event.event_type(), e);
                            }
                        },
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("SSE: {} client lagging, {} events dropped", service_name, skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!("SSE: {} event bus closed, ending stream", service_name);
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_to_sse_event_succeeds_for_lifecycle_event() {
        let event = SessionEvent::SessionStopped {
            session_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };
        assert!(to_sse_event(&event).is_ok());
    }
}
