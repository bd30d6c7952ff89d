//! Server-Sent Events (SSE) utilities
//!
//! Two stream shapes are used by the intake service: a heartbeat-only stream
//! for connection status, and a forwarding stream that relays `IntakeEvent`s
//! from the `EventBus`.

use crate::events::{EventBus, IntakeEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Heartbeat interval shared by both stream shapes
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Create a heartbeat-only SSE stream for connection status monitoring
pub fn create_heartbeat_sse_stream(
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} general events", service_name);

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            debug!("SSE: Sending heartbeat");
            yield Ok(Event::default().comment("heartbeat"));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat"))
}

/// Convert an event into an SSE frame named after its variant
pub fn to_sse_event(event: &IntakeEvent) -> Option<Event> {
    let event_type = event.event_type();
    match serde_json::to_string(event) {
        Ok(json) => Some(Event::default().event(event_type).data(json)),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
            None
        }
    }
}

/// Relay events from the bus that pass `filter`
///
/// A lagging client skips the events it missed and keeps streaming; the batch
/// snapshot endpoint is the way to resynchronise.
pub fn create_event_sse_stream<F>(
    event_bus: &EventBus,
    filter: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    F: Fn(&IntakeEvent) -> bool + Send + 'static,
{
    let mut rx = event_bus.subscribe();

    let stream = async_stream::stream! {
        info!("SSE: Intake event stream started");

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !filter(&event) {
                        continue;
                    }
                    if let Some(frame) = to_sse_event(&event) {
                        debug!("SSE: Broadcasting {}", event.event_type());
                        yield Ok(frame);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: Client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => {
                    info!("SSE: Event bus closed, ending stream");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PhaseKind;

    #[test]
    fn test_to_sse_event_serializes_known_event() {
        let event = IntakeEvent::BatchPhaseChanged {
            batch_id: uuid::Uuid::new_v4(),
            old_phase: PhaseKind::Processing,
            new_phase: PhaseKind::Summary,
            timestamp: chrono::Utc::now(),
        };
        assert!(to_sse_event(&event).is_some());
    }
}
