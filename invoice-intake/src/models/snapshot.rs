//! Read-only views of a batch for the presentation layer

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::batch::{Batch, PendingDuplicate};
use super::batch_item::{BatchItem, ContentType, ItemId};
use super::existing_record::ExistingRecord;
use invoice_common::events::{ItemStatus, PhaseKind};

/// One progress row
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub id: ItemId,
    pub file_name: String,
    pub content_type: ContentType,
    pub size_bytes: usize,
    pub status: ItemStatus,
    pub progress: u8,
    pub enqueued_at: DateTime<Utc>,
    /// Time of the last status change
    pub updated_at: DateTime<Utc>,
}

impl From<&BatchItem> for ItemView {
    fn from(item: &BatchItem) -> Self {
        Self {
            id: item.id(),
            file_name: item.source().name().to_string(),
            content_type: item.source().content_type(),
            size_bytes: item.source().len(),
            status: item.status(),
            progress: item.progress(),
            enqueued_at: item.enqueued_at(),
            updated_at: item.updated_at(),
        }
    }
}

/// Side-by-side duplicate review
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateView {
    pub item_id: ItemId,
    pub file_name: String,
    /// `data:` URL of the new upload
    pub new_file_preview: String,
    pub existing_record: ExistingRecord,
    pub detected_at: DateTime<Utc>,
}

impl From<&PendingDuplicate> for DuplicateView {
    fn from(pending: &PendingDuplicate) -> Self {
        Self {
            item_id: pending.item_id,
            file_name: pending.new_file.name().to_string(),
            new_file_preview: pending.new_file.preview_data_url(),
            existing_record: pending.existing_record.clone(),
            detected_at: pending.detected_at,
        }
    }
}

/// Whole-batch view
#[derive(Debug, Clone, Serialize)]
pub struct BatchSnapshot {
    pub batch_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub phase: PhaseKind,
    pub items: Vec<ItemView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_duplicate: Option<DuplicateView>,
    pub total: usize,
    pub completed: usize,
    pub discarded: usize,
}

impl From<&Batch> for BatchSnapshot {
    fn from(batch: &Batch) -> Self {
        Self {
            batch_id: batch.id(),
            created_at: batch.created_at(),
            phase: batch.phase().kind(),
            items: batch.items().map(ItemView::from).collect(),
            pending_duplicate: batch.phase().pending_duplicate().map(DuplicateView::from),
            total: batch.len(),
            completed: batch.count(ItemStatus::Complete),
            discarded: batch.count(ItemStatus::Discarded),
        }
    }
}

impl BatchSnapshot {
    pub fn item(&self, id: ItemId) -> Option<&ItemView> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// Summary view shown once the batch settles
///
/// Discarded uploads are counted but not listed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub items: Vec<ItemView>,
    pub completed: usize,
    pub discarded: usize,
}

impl From<&Batch> for BatchSummary {
    fn from(batch: &Batch) -> Self {
        Self {
            batch_id: batch.id(),
            items: batch
                .items()
                .filter(|item| item.status() != ItemStatus::Discarded)
                .map(ItemView::from)
                .collect(),
            completed: batch.count(ItemStatus::Complete),
            discarded: batch.count(ItemStatus::Discarded),
        }
    }
}
