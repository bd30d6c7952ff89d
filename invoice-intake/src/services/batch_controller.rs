//! Batch controller
//!
//! Owns the batch of one open upload surface, selects which item the
//! pipeline works on, and drives the batch phase:
//!
//! ```text
//! upload --enqueue--> processing --duplicate found--> duplicate --keep/discard--> processing
//!                     processing --all items settled + settle delay--> summary
//! any phase --reset--> upload
//! ```
//!
//! All batch state sits behind one mutex. Pipeline timers never lock it; they
//! send `StageTransition` requests over a channel to a driver task, which
//! applies them here. Every applied status change goes through
//! [`BatchController::on_item_settled`] exactly once.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{
    Batch, BatchError, BatchSnapshot, BatchSummary, DuplicateDecision, ExistingRecord, ItemId,
    NextAction, PhaseKind, SourceFile, StatusChange,
};
use crate::services::item_pipeline::{Admission, ItemPipeline, StagePlan, StageTransition};
use crate::services::record_store::RecordStore;
use invoice_common::events::{EventBus, IntakeEvent};

/// Handle to the controller of one upload session
///
/// Cheap to clone; all clones drive the same batch. Must be created inside a
/// Tokio runtime.
#[derive(Clone)]
pub struct BatchController {
    shared: Arc<Shared>,
}

struct Shared {
    batch_id: Uuid,
    state: Mutex<ControllerState>,
    pipeline: ItemPipeline,
    records: RecordStore,
    event_bus: EventBus,
    settle_delay: Duration,
    stage_tx: mpsc::UnboundedSender<StageTransition>,
    settle_tx: mpsc::UnboundedSender<u64>,
}

struct ControllerState {
    batch: Batch,
    /// Bumped on reset/close; timers from an older epoch are ignored
    epoch: u64,
    /// Parent of every timer started in the current epoch
    cancel: CancellationToken,
    settle_pending: bool,
    last_phase: PhaseKind,
    closed: bool,
}

impl BatchController {
    /// Open a fresh, empty batch
    pub fn new(
        pipeline: ItemPipeline,
        records: RecordStore,
        event_bus: EventBus,
        settle_delay: Duration,
    ) -> Self {
        let batch = Batch::new();
        let batch_id = batch.id();
        let (stage_tx, stage_rx) = mpsc::unbounded_channel();
        let (settle_tx, settle_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            batch_id,
            state: Mutex::new(ControllerState {
                batch,
                epoch: 0,
                cancel: CancellationToken::new(),
                settle_pending: false,
                last_phase: PhaseKind::Upload,
                closed: false,
            }),
            pipeline,
            records,
            event_bus,
            settle_delay,
            stage_tx,
            settle_tx,
        });

        tokio::spawn(run_driver(Arc::downgrade(&shared), stage_rx, settle_rx));

        info!(batch_id = %batch_id, "Upload batch opened");
        shared.event_bus.emit_lossy(IntakeEvent::BatchOpened {
            batch_id,
            timestamp: Utc::now(),
        });

        Self { shared }
    }

    pub fn batch_id(&self) -> Uuid {
        self.shared.batch_id
    }

    /// Append files as `waiting` items and start selection
    pub async fn enqueue(&self, files: Vec<SourceFile>) -> Result<Vec<ItemId>, BatchError> {
        let mut st = self.lock_open().await?;

        let names: Vec<String> = files.iter().map(|f| f.name().to_string()).collect();
        let start_position = st.batch.len();
        let ids = st.batch.enqueue(files)?;

        for (offset, (item_id, file_name)) in ids.iter().zip(names).enumerate() {
            debug!(batch_id = %self.batch_id(), item_id = %item_id, file_name = %file_name, "Item enqueued");
            self.shared.event_bus.emit_lossy(IntakeEvent::ItemEnqueued {
                batch_id: self.batch_id(),
                item_id: *item_id,
                file_name,
                position: start_position + offset,
                timestamp: Utc::now(),
            });
        }

        if !ids.is_empty() {
            info!(batch_id = %self.batch_id(), count = ids.len(), "Files enqueued");
        }

        self.publish_phase(&mut st);
        self.select_next(&mut st);
        Ok(ids)
    }

    /// Hold `item_id` for review against `record` and enter the duplicate phase
    ///
    /// The selection rule already guarantees a single held item; calling this
    /// while another duplicate is pending fails without touching the batch.
    pub async fn on_duplicate_detected(
        &self,
        item_id: ItemId,
        record: ExistingRecord,
    ) -> Result<(), BatchError> {
        let mut st = self.lock_open().await?;
        let change = self.hold_for_review(&mut st, item_id, record)?;
        self.apply_change(&mut st, change);
        Ok(())
    }

    /// Apply the user's keep/discard decision to the held item
    pub async fn resolve_duplicate(&self, decision: DuplicateDecision) -> Result<ItemId, BatchError> {
        let mut st = self.lock_open().await?;
        let (change, pending) = st.batch.resolve_duplicate(decision)?;

        info!(
            batch_id = %self.batch_id(),
            item_id = %pending.item_id,
            existing_record = %pending.existing_record.id,
            decision = ?decision,
            "Duplicate resolved"
        );
        self.shared.event_bus.emit_lossy(IntakeEvent::DuplicateResolved {
            batch_id: self.batch_id(),
            item_id: pending.item_id,
            decision,
            timestamp: Utc::now(),
        });
        self.publish_phase(&mut st);
        self.apply_change(&mut st, change);

        Ok(pending.item_id)
    }

    /// Schedule the move to `summary` once every item has settled
    ///
    /// No-op in `summary`, while a settle is already scheduled, or while any
    /// item is still in flight.
    pub async fn check_completion(&self) {
        let mut st = self.shared.state.lock().await;
        if !st.closed {
            self.check_completion_locked(&mut st);
        }
    }

    /// Clear every item and return to `upload` ("upload more")
    ///
    /// Returns the number of items dropped.
    pub async fn reset(&self) -> Result<usize, BatchError> {
        let mut st = self.lock_open().await?;
        let dropped = self.reset_locked(&mut st);

        info!(batch_id = %self.batch_id(), items_dropped = dropped, "Batch reset");
        self.shared.event_bus.emit_lossy(IntakeEvent::BatchReset {
            batch_id: self.batch_id(),
            items_dropped: dropped,
            timestamp: Utc::now(),
        });
        self.publish_phase(&mut st);
        Ok(dropped)
    }

    /// Close the upload surface: cancel all timers and discard the batch
    ///
    /// Idempotent. Every later operation on this handle fails with
    /// [`BatchError::Closed`].
    pub async fn close(&self) {
        let mut st = self.shared.state.lock().await;
        if st.closed {
            return;
        }
        let dropped = self.reset_locked(&mut st);
        st.closed = true;

        info!(batch_id = %self.batch_id(), items_dropped = dropped, "Upload surface closed");
        self.shared.event_bus.emit_lossy(IntakeEvent::BatchClosed {
            batch_id: self.batch_id(),
            timestamp: Utc::now(),
        });
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.state.lock().await.closed
    }

    /// Read-only view of the whole batch
    pub async fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot::from(&self.shared.state.lock().await.batch)
    }

    /// Summary view; only available once the batch is in `summary`
    pub async fn summary(&self) -> Result<BatchSummary, BatchError> {
        let st = self.lock_open().await?;
        match st.batch.phase().kind() {
            PhaseKind::Summary => Ok(BatchSummary::from(&st.batch)),
            phase => Err(BatchError::NotSettled { phase }),
        }
    }

    /// Event-driven transition function
    ///
    /// Publishes one applied status change and returns what the controller
    /// should do next.
    fn on_item_settled(&self, st: &ControllerState, change: &StatusChange) -> NextAction {
        debug!(
            batch_id = %self.batch_id(),
            item_id = %change.item_id,
            from = %change.old_status,
            to = %change.new_status,
            "Item status changed"
        );
        self.shared.event_bus.emit_lossy(IntakeEvent::ItemStatusChanged {
            batch_id: self.batch_id(),
            item_id: change.item_id,
            old_status: change.old_status,
            new_status: change.new_status,
            progress: change.new_status.progress(),
            timestamp: change.changed_at,
        });

        st.batch.next_action()
    }

    /// Publish `change` and follow the controller actions it leads to
    fn apply_change(&self, st: &mut ControllerState, change: StatusChange) {
        let mut next = Some(change);
        while let Some(change) = next.take() {
            let action = self.on_item_settled(st, &change);
            next = self.dispatch(st, action);
        }
    }

    /// Run the selection rule from the current state
    fn select_next(&self, st: &mut ControllerState) {
        let action = st.batch.next_action();
        if let Some(change) = self.dispatch(st, action) {
            self.apply_change(st, change);
        }
    }

    /// Carry out one controller action
    ///
    /// Returns the status change the action applied, if any.
    fn dispatch(&self, st: &mut ControllerState, action: NextAction) -> Option<StatusChange> {
        match action {
            NextAction::Admit(item_id) => {
                let item = st.batch.item(item_id)?;
                let admission = match self.shared.pipeline.admit(item, self.shared.records.records()) {
                    Ok(admission) => admission,
                    Err(e) => {
                        error!(batch_id = %self.batch_id(), error = %e, "Admission failed");
                        return None;
                    }
                };

                match admission {
                    Admission::Duplicate(record) => {
                        match self.hold_for_review(st, item_id, record) {
                            Ok(change) => Some(change),
                            Err(e) => {
                                error!(batch_id = %self.batch_id(), error = %e, "Duplicate hold failed");
                                None
                            }
                        }
                    }
                    Admission::Advance(plan) => self.start_plan(st, item_id, plan),
                }
            }
            NextAction::Resume(item_id) => {
                let item = st.batch.item(item_id)?;
                match self.shared.pipeline.resume(item) {
                    Ok(plan) => self.start_plan(st, item_id, plan),
                    Err(e) => {
                        error!(batch_id = %self.batch_id(), error = %e, "Resume failed");
                        None
                    }
                }
            }
            NextAction::Settle => {
                self.check_completion_locked(st);
                None
            }
            NextAction::Busy(_) | NextAction::AwaitDecision(_) | NextAction::Idle => None,
        }
    }

    /// Apply the plan's entry status and start its timers
    fn start_plan(
        &self,
        st: &mut ControllerState,
        item_id: ItemId,
        plan: StagePlan,
    ) -> Option<StatusChange> {
        let change = match st.batch.advance_item(item_id, plan.entry) {
            Ok(change) => change,
            Err(e) => {
                error!(batch_id = %self.batch_id(), error = %e, "Could not start stage plan");
                return None;
            }
        };

        self.shared.pipeline.spawn_steps(
            item_id,
            st.epoch,
            &plan,
            st.cancel.child_token(),
            self.shared.stage_tx.clone(),
        );
        Some(change)
    }

    fn hold_for_review(
        &self,
        st: &mut ControllerState,
        item_id: ItemId,
        record: ExistingRecord,
    ) -> Result<StatusChange, BatchError> {
        let file_name = st
            .batch
            .item(item_id)
            .ok_or(BatchError::UnknownItem(item_id))?
            .source()
            .name()
            .to_string();
        let existing_record_id = record.id.clone();
        let existing_vendor = record.vendor.clone();

        let change = st.batch.hold_for_review(item_id, record)?;

        warn!(
            batch_id = %self.batch_id(),
            item_id = %item_id,
            file_name = %file_name,
            existing_record = %existing_record_id,
            "Upload held for duplicate review"
        );
        self.shared.event_bus.emit_lossy(IntakeEvent::DuplicateDetected {
            batch_id: self.batch_id(),
            item_id,
            file_name,
            existing_record_id,
            existing_vendor,
            timestamp: change.changed_at,
        });
        self.publish_phase(st);

        Ok(change)
    }

    fn check_completion_locked(&self, st: &mut ControllerState) {
        if st.batch.phase().kind() != PhaseKind::Processing
            || st.settle_pending
            || !st.batch.all_settled()
        {
            return;
        }

        st.settle_pending = true;
        debug!(batch_id = %self.batch_id(), "All items settled, scheduling summary");

        let epoch = st.epoch;
        let delay = self.shared.settle_delay;
        let cancel = st.cancel.child_token();
        let tx = self.shared.settle_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(epoch);
                }
            }
        });
    }

    async fn on_stage_transition(&self, transition: StageTransition) {
        let mut st = self.shared.state.lock().await;
        if st.closed || transition.epoch != st.epoch {
            debug!(
                batch_id = %self.batch_id(),
                item_id = %transition.item_id,
                epoch = transition.epoch,
                "Dropping stale stage transition"
            );
            return;
        }

        match st.batch.advance_item(transition.item_id, transition.status) {
            Ok(change) => self.apply_change(&mut st, change),
            Err(e) => warn!(batch_id = %self.batch_id(), error = %e, "Stage transition rejected"),
        }
    }

    async fn on_settle_elapsed(&self, epoch: u64) {
        let mut st = self.shared.state.lock().await;
        if st.closed || epoch != st.epoch {
            return;
        }
        st.settle_pending = false;

        if st.batch.enter_summary() {
            let completed = st.batch.count(crate::models::ItemStatus::Complete);
            let discarded = st.batch.count(crate::models::ItemStatus::Discarded);
            info!(batch_id = %self.batch_id(), completed, discarded, "Batch settled");

            self.publish_phase(&mut st);
            self.shared.event_bus.emit_lossy(IntakeEvent::BatchSummaryReady {
                batch_id: self.batch_id(),
                completed,
                discarded,
                timestamp: Utc::now(),
            });
        }
    }

    fn reset_locked(&self, st: &mut ControllerState) -> usize {
        st.cancel.cancel();
        st.cancel = CancellationToken::new();
        st.epoch += 1;
        st.settle_pending = false;
        st.batch.reset()
    }

    /// Emit `BatchPhaseChanged` if the phase moved since the last call
    fn publish_phase(&self, st: &mut ControllerState) {
        let current = st.batch.phase().kind();
        if current == st.last_phase {
            return;
        }
        let old = std::mem::replace(&mut st.last_phase, current);

        info!(batch_id = %self.batch_id(), from = %old, to = %current, "Batch phase changed");
        self.shared.event_bus.emit_lossy(IntakeEvent::BatchPhaseChanged {
            batch_id: self.batch_id(),
            old_phase: old,
            new_phase: current,
            timestamp: Utc::now(),
        });
    }

    async fn lock_open(&self) -> Result<tokio::sync::MutexGuard<'_, ControllerState>, BatchError> {
        let st = self.shared.state.lock().await;
        if st.closed {
            return Err(BatchError::Closed);
        }
        Ok(st)
    }
}

/// Applies timer requests until every sender is gone
///
/// Holds only a weak reference so dropping the last controller handle ends
/// the session.
async fn run_driver(
    shared: Weak<Shared>,
    mut stage_rx: mpsc::UnboundedReceiver<StageTransition>,
    mut settle_rx: mpsc::UnboundedReceiver<u64>,
) {
    loop {
        tokio::select! {
            Some(transition) = stage_rx.recv() => {
                let Some(shared) = shared.upgrade() else { break };
                BatchController { shared }.on_stage_transition(transition).await;
            }
            Some(epoch) = settle_rx.recv() => {
                let Some(shared) = shared.upgrade() else { break };
                BatchController { shared }.on_settle_elapsed(epoch).await;
            }
            else => break,
        }
    }
    debug!("Batch controller driver stopped");
}
