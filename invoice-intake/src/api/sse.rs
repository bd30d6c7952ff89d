//! Server-Sent Events (SSE) endpoints
//!
//! `/events` is a heartbeat-only stream for connection status; `/upload/events`
//! relays batch progress from the EventBus.

use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use invoice_common::sse::{create_event_sse_stream, create_heartbeat_sse_stream};

/// Optional filter for GET /upload/events
#[derive(Debug, Default, Deserialize)]
pub struct UploadEventsQuery {
    /// Only relay events of this batch
    pub batch_id: Option<Uuid>,
}

/// GET /events - heartbeat stream
pub async fn event_stream() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    create_heartbeat_sse_stream("invoice-intake")
}

/// GET /upload/events - SSE stream of batch progress
///
/// Streams every `IntakeEvent`: item enqueued and status changes, phase
/// changes, duplicate detection and resolution, summary, reset and close.
/// `?batch_id=` restricts the stream to one batch.
pub async fn upload_event_stream(
    State(state): State<AppState>,
    Query(query): Query<UploadEventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(batch_id = ?query.batch_id, "New SSE client connected to upload events");

    let wanted = query.batch_id;
    create_event_sse_stream(&state.event_bus, move |event| {
        wanted.map_or(true, |id| event.batch_id() == id)
    })
}
