//! Event types for the intake event system
//!
//! Provides the shared event definitions and the EventBus used by the intake
//! service to publish batch progress to the presentation layer.

mod intake_types;

pub use intake_types::{DuplicateDecision, ItemStatus, PhaseKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Intake event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Every variant carries the batch it belongs to, so a consumer that reconnects
/// after the upload surface was reopened can drop events from an older batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntakeEvent {
    /// Upload surface opened with a fresh, empty batch
    ///
    /// Triggers:
    /// - SSE: Show drop zone
    BatchOpened {
        /// Batch UUID
        batch_id: Uuid,
        /// When the batch was created
        timestamp: DateTime<Utc>,
    },

    /// File accepted by the upload surface and appended to the batch
    ///
    /// Triggers:
    /// - SSE: Add a progress row
    ItemEnqueued {
        /// Batch UUID
        batch_id: Uuid,
        /// Item UUID
        item_id: Uuid,
        /// Display name of the source file
        file_name: String,
        /// Position in the batch (0-based, insertion order)
        position: usize,
        /// When the item was enqueued
        timestamp: DateTime<Utc>,
    },

    /// Item moved along its pipeline
    ///
    /// Emitted exactly once per applied status change.
    ///
    /// Triggers:
    /// - SSE: Update the item's status label and progress bar
    ItemStatusChanged {
        /// Batch UUID
        batch_id: Uuid,
        /// Item UUID
        item_id: Uuid,
        /// Status before the change
        old_status: ItemStatus,
        /// Status after the change
        new_status: ItemStatus,
        /// Progress milestone of `new_status` (0-100)
        progress: u8,
        /// When the change was applied
        timestamp: DateTime<Utc>,
    },

    /// Batch phase changed
    ///
    /// Triggers:
    /// - SSE: Switch between drop zone, progress list, duplicate review and summary
    BatchPhaseChanged {
        /// Batch UUID
        batch_id: Uuid,
        /// Phase before the change
        old_phase: PhaseKind,
        /// Phase after the change
        new_phase: PhaseKind,
        /// When the phase changed
        timestamp: DateTime<Utc>,
    },

    /// Item held as a possible duplicate of an existing record
    ///
    /// Triggers:
    /// - SSE: Show the side-by-side review with keep/discard actions
    DuplicateDetected {
        /// Batch UUID
        batch_id: Uuid,
        /// Held item UUID
        item_id: Uuid,
        /// Display name of the new file
        file_name: String,
        /// Identifier of the record it collided with
        existing_record_id: String,
        /// Vendor label of that record
        existing_vendor: String,
        /// When the hold started
        timestamp: DateTime<Utc>,
    },

    /// User decided on a held item
    DuplicateResolved {
        /// Batch UUID
        batch_id: Uuid,
        /// Previously held item UUID
        item_id: Uuid,
        /// Keep or discard
        decision: DuplicateDecision,
        /// When the decision was applied
        timestamp: DateTime<Utc>,
    },

    /// Every item settled; summary view available
    BatchSummaryReady {
        /// Batch UUID
        batch_id: Uuid,
        /// Items that reached `complete`
        completed: usize,
        /// Items that were discarded
        discarded: usize,
        /// When the batch settled
        timestamp: DateTime<Utc>,
    },

    /// Batch cleared and returned to the drop zone ("upload more")
    BatchReset {
        /// Batch UUID
        batch_id: Uuid,
        /// Items dropped by the reset
        items_dropped: usize,
        /// When the reset happened
        timestamp: DateTime<Utc>,
    },

    /// Upload surface closed; batch discarded
    BatchClosed {
        /// Batch UUID
        batch_id: Uuid,
        /// When the surface closed
        timestamp: DateTime<Utc>,
    },
}

impl IntakeEvent {
    /// Get event type as string for filtering and SSE event names
    pub fn event_type(&self) -> &str {
        match self {
            IntakeEvent::BatchOpened { .. } => "BatchOpened",
            IntakeEvent::ItemEnqueued { .. } => "ItemEnqueued",
            IntakeEvent::ItemStatusChanged { .. } => "ItemStatusChanged",
            IntakeEvent::BatchPhaseChanged { .. } => "BatchPhaseChanged",
            IntakeEvent::DuplicateDetected { .. } => "DuplicateDetected",
            IntakeEvent::DuplicateResolved { .. } => "DuplicateResolved",
            IntakeEvent::BatchSummaryReady { .. } => "BatchSummaryReady",
            IntakeEvent::BatchReset { .. } => "BatchReset",
            IntakeEvent::BatchClosed { .. } => "BatchClosed",
        }
    }

    /// Batch the event belongs to
    pub fn batch_id(&self) -> Uuid {
        match self {
            IntakeEvent::BatchOpened { batch_id, .. }
            | IntakeEvent::ItemEnqueued { batch_id, .. }
            | IntakeEvent::ItemStatusChanged { batch_id, .. }
            | IntakeEvent::BatchPhaseChanged { batch_id, .. }
            | IntakeEvent::DuplicateDetected { batch_id, .. }
            | IntakeEvent::DuplicateResolved { batch_id, .. }
            | IntakeEvent::BatchSummaryReady { batch_id, .. }
            | IntakeEvent::BatchReset { batch_id, .. }
            | IntakeEvent::BatchClosed { batch_id, .. } => *batch_id,
        }
    }
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use invoice_common::events::{EventBus, IntakeEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(IntakeEvent::BatchOpened {
///     batch_id: uuid::Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IntakeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: IntakeEvent,
    ) -> Result<usize, broadcast::error::SendError<IntakeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress updates are fire-and-forget: the batch state is the source of
    /// truth and can always be re-read through a snapshot.
    pub fn emit_lossy(&self, event: IntakeEvent) {
        if let Err(broadcast::error::SendError(event)) = self.emit(event) {
            tracing::trace!(event_type = event.event_type(), "No subscribers for event");
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

    #[test]
    fn test_emit_without_subscribers_is_error() {
        let bus = EventBus::new(10);
        let result = bus.emit(IntakeEvent::BatchClosed {
            batch_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let batch_id = Uuid::new_v4();

        bus.emit(IntakeEvent::BatchPhaseChanged {
            batch_id,
            old_phase: PhaseKind::Upload,
            new_phase: PhaseKind::Processing,
            timestamp: Utc::now(),
        })
        .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "BatchPhaseChanged");
        assert_eq!(event.batch_id(), batch_id);
    }

    #[tokio::test]
    async fn test_emit_lossy_tolerates_missing_subscribers() {
        let bus = EventBus::new(10);
        let batch_id = Uuid::new_v4();
        bus.emit_lossy(IntakeEvent::BatchClosed {
            batch_id,
            timestamp: Utc::now(),
        });

        let mut rx = bus.subscribe();
        bus.emit_lossy(IntakeEvent::BatchClosed {
            batch_id,
            timestamp: Utc::now(),
        });
        assert_eq!(rx.recv().await.unwrap().batch_id(), batch_id);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = IntakeEvent::ItemStatusChanged {
            batch_id: Uuid::nil(),
            item_id: Uuid::nil(),
            old_status: ItemStatus::Duplicate,
            new_status: ItemStatus::WaitingFinal,
            progress: 60,
            timestamp: Utc::now(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ItemStatusChanged");
        assert_eq!(json["new_status"], "waiting_final");
        assert_eq!(json["progress"], 60);
    }

    #[test]
    fn test_capacity_and_subscriber_count() {
        let bus = EventBus::new(42);
        assert_eq!(bus.capacity(), 42);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }
}
