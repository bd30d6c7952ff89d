//! Upload batch: the items of one open upload surface and the batch phase
//!
//! Items live in an arena keyed by id with a separate insertion-order list.
//! The phase is a tagged variant so the pending duplicate can only exist while
//! the batch is in duplicate review.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use super::batch_item::{BatchItem, ItemId, SourceFile, StatusChange};
use super::existing_record::ExistingRecord;
use invoice_common::events::{DuplicateDecision, ItemStatus, PhaseKind};

/// Batch and item state machine violations
///
/// Each one is fatal to the attempted operation only; the batch is left as it
/// was before the call.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    #[error("Item {item_id} cannot move from {from} to {to}")]
    IllegalTransition {
        item_id: ItemId,
        from: ItemStatus,
        to: ItemStatus,
    },

    #[error("Item {pending} is already held for duplicate review")]
    DuplicateAlreadyPending { pending: ItemId },

    #[error("No duplicate decision is pending")]
    NoPendingDuplicate,

    #[error("Files cannot be added while the batch is in {phase} phase")]
    EnqueueRejected { phase: PhaseKind },

    #[error("Batch has not settled yet (phase: {phase})")]
    NotSettled { phase: PhaseKind },

    #[error("Upload surface has been closed")]
    Closed,
}

/// Duplicate-review context: the held item and the record it collided with
#[derive(Debug, Clone)]
pub struct PendingDuplicate {
    pub item_id: ItemId,
    pub new_file: SourceFile,
    pub existing_record: ExistingRecord,
    pub detected_at: DateTime<Utc>,
}

/// Batch-level workflow phase
#[derive(Debug, Clone)]
pub enum BatchPhase {
    /// Drop zone shown, no items yet
    Upload,
    /// Items are being selected and advanced
    Processing,
    /// One item held; waiting for keep/discard
    Duplicate(PendingDuplicate),
    /// Every item is complete or discarded
    Summary,
}

impl BatchPhase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            BatchPhase::Upload => PhaseKind::Upload,
            BatchPhase::Processing => PhaseKind::Processing,
            BatchPhase::Duplicate(_) => PhaseKind::Duplicate,
            BatchPhase::Summary => PhaseKind::Summary,
        }
    }

    pub fn pending_duplicate(&self) -> Option<&PendingDuplicate> {
        match self {
            BatchPhase::Duplicate(pending) => Some(pending),
            _ => None,
        }
    }
}

/// What the controller should do next, derived from batch state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Hand a `waiting` item to the pipeline for admission
    Admit(ItemId),
    /// Hand a `waiting_final` item to the pipeline for resumption
    Resume(ItemId),
    /// An item is already advancing; nothing to select
    Busy(ItemId),
    /// Duplicate review is open; selection is paused
    AwaitDecision(ItemId),
    /// Every item is terminal; the batch can move to summary
    Settle,
    /// Nothing to do (empty batch, or already in summary)
    Idle,
}

/// Items of one upload session plus the batch phase
#[derive(Debug)]
pub struct Batch {
    batch_id: Uuid,
    items: HashMap<ItemId, BatchItem>,
    order: Vec<ItemId>,
    phase: BatchPhase,
    created_at: DateTime<Utc>,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    /// Fresh, empty batch in `upload` phase
    pub fn new() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            items: HashMap::new(),
            order: Vec::new(),
            phase: BatchPhase::Upload,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.batch_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn phase(&self) -> &BatchPhase {
        &self.phase
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn item(&self, id: ItemId) -> Option<&BatchItem> {
        self.items.get(&id)
    }

    /// Items in insertion order
    pub fn items(&self) -> impl Iterator<Item = &BatchItem> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    /// Number of items currently in `status`
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items().filter(|item| item.status() == status).count()
    }

    /// True when the batch is non-empty and every item is terminal
    pub fn all_settled(&self) -> bool {
        !self.is_empty() && self.items().all(BatchItem::is_terminal)
    }

    /// Append files as `waiting` items
    ///
    /// Accepted in `upload` and `processing`; the first non-empty enqueue moves
    /// the batch from `upload` to `processing`. An empty file list is a no-op.
    pub fn enqueue(&mut self, files: Vec<SourceFile>) -> Result<Vec<ItemId>, BatchError> {
        match self.phase {
            BatchPhase::Upload | BatchPhase::Processing => {}
            _ => {
                return Err(BatchError::EnqueueRejected {
                    phase: self.phase.kind(),
                })
            }
        }

        if files.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<ItemId> = files
            .into_iter()
            .map(|file| {
                let item = BatchItem::new(file);
                let id = item.id();
                self.order.push(id);
                self.items.insert(id, item);
                id
            })
            .collect();

        if matches!(self.phase, BatchPhase::Upload) {
            self.phase = BatchPhase::Processing;
        }

        Ok(ids)
    }

    /// Selection rule: at most one active item, earliest eligible first
    pub fn next_action(&self) -> NextAction {
        match &self.phase {
            BatchPhase::Upload | BatchPhase::Summary => NextAction::Idle,
            BatchPhase::Duplicate(pending) => NextAction::AwaitDecision(pending.item_id),
            BatchPhase::Processing => {
                if let Some(active) = self.items().find(|item| item.status().is_active()) {
                    return NextAction::Busy(active.id());
                }

                match self.items().find(|item| item.status().is_eligible()) {
                    Some(item) if item.status() == ItemStatus::Waiting => {
                        NextAction::Admit(item.id())
                    }
                    Some(item) => NextAction::Resume(item.id()),
                    None if self.all_settled() => NextAction::Settle,
                    None => NextAction::Idle,
                }
            }
        }
    }

    /// Apply one pipeline stage transition to an item
    ///
    /// Only the timed pipeline edges go through here; the duplicate branch has
    /// its own entry points so the phase always moves together with the item.
    pub fn advance_item(
        &mut self,
        item_id: ItemId,
        next: ItemStatus,
    ) -> Result<StatusChange, BatchError> {
        if matches!(
            next,
            ItemStatus::Duplicate | ItemStatus::WaitingFinal | ItemStatus::Discarded
        ) {
            let from = self
                .item(item_id)
                .ok_or(BatchError::UnknownItem(item_id))?
                .status();
            return Err(BatchError::IllegalTransition {
                item_id,
                from,
                to: next,
            });
        }

        self.item_mut(item_id)?.transition_to(next)
    }

    /// Hold a `waiting` item for review and enter the duplicate phase
    pub fn hold_for_review(
        &mut self,
        item_id: ItemId,
        existing_record: ExistingRecord,
    ) -> Result<StatusChange, BatchError> {
        if let BatchPhase::Duplicate(pending) = &self.phase {
            return Err(BatchError::DuplicateAlreadyPending {
                pending: pending.item_id,
            });
        }

        let item = self.item_mut(item_id)?;
        let change = item.transition_to(ItemStatus::Duplicate)?;
        let new_file = item.source().clone();

        self.phase = BatchPhase::Duplicate(PendingDuplicate {
            item_id,
            new_file,
            existing_record,
            detected_at: change.changed_at,
        });

        Ok(change)
    }

    /// Apply the user's decision to the held item and return to processing
    pub fn resolve_duplicate(
        &mut self,
        decision: DuplicateDecision,
    ) -> Result<(StatusChange, PendingDuplicate), BatchError> {
        let item_id = match &self.phase {
            BatchPhase::Duplicate(pending) => pending.item_id,
            _ => return Err(BatchError::NoPendingDuplicate),
        };

        let next = match decision {
            DuplicateDecision::Keep => ItemStatus::WaitingFinal,
            DuplicateDecision::Discard => ItemStatus::Discarded,
        };
        let change = self.item_mut(item_id)?.transition_to(next)?;

        let BatchPhase::Duplicate(pending) =
            std::mem::replace(&mut self.phase, BatchPhase::Processing)
        else {
            return Err(BatchError::NoPendingDuplicate);
        };

        Ok((change, pending))
    }

    /// Move to `summary` if every item has settled
    ///
    /// Returns false, leaving the phase untouched, when the batch is not in
    /// `processing` or some item is still in flight.
    pub fn enter_summary(&mut self) -> bool {
        if matches!(self.phase, BatchPhase::Processing) && self.all_settled() {
            self.phase = BatchPhase::Summary;
            true
        } else {
            false
        }
    }

    /// Drop every item and return to `upload`
    ///
    /// Returns the number of items dropped.
    pub fn reset(&mut self) -> usize {
        let dropped = self.order.len();
        self.items.clear();
        self.order.clear();
        self.phase = BatchPhase::Upload;
        dropped
    }

    fn item_mut(&mut self, item_id: ItemId) -> Result<&mut BatchItem, BatchError> {
        self.items
            .get_mut(&item_id)
            .ok_or(BatchError::UnknownItem(item_id))
    }
}
