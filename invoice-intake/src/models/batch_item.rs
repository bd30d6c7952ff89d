//! Batch items and their source files
//!
//! An item is one enqueued file and its position in the per-item pipeline:
//! waiting → uploading → extracting → analyzing → complete, with the
//! duplicate-hold branch waiting → duplicate → (waiting_final → analyzing) | discarded.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::BatchError;
use invoice_common::events::ItemStatus;

/// Opaque item identifier, assigned at enqueue time
pub type ItemId = Uuid;

/// Content types accepted at the upload boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Pdf,
    Png,
    Jpeg,
}

impl ContentType {
    /// MIME type string
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Pdf => "application/pdf",
            ContentType::Png => "image/png",
            ContentType::Jpeg => "image/jpeg",
        }
    }
}

/// User-supplied file content
///
/// Cheap to clone; the bytes are shared and never mutated after the upload
/// surface accepted them.
#[derive(Clone)]
pub struct SourceFile {
    name: String,
    content_type: ContentType,
    bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content_type: ContentType, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type,
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `data:` URL for the duplicate-review preview
    pub fn preview_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type.mime(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Applied status change of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub item_id: ItemId,
    pub old_status: ItemStatus,
    pub new_status: ItemStatus,
    pub changed_at: DateTime<Utc>,
}

/// One enqueued file undergoing processing
#[derive(Debug, Clone)]
pub struct BatchItem {
    id: ItemId,
    source: SourceFile,
    status: ItemStatus,
    enqueued_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BatchItem {
    /// New item in `waiting` at progress 0
    pub fn new(source: SourceFile) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source,
            status: ItemStatus::Waiting,
            enqueued_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Progress is derived from status, never stored separately
    pub fn progress(&self) -> u8 {
        self.status.progress()
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move along one edge of the item state machine
    pub fn transition_to(&mut self, next: ItemStatus) -> Result<StatusChange, BatchError> {
        if !self.status.can_transition_to(next) {
            return Err(BatchError::IllegalTransition {
                item_id: self.id,
                from: self.status,
                to: next,
            });
        }

        let change = StatusChange {
            item_id: self.id,
            old_status: self.status,
            new_status: next,
            changed_at: Utc::now(),
        };
        self.status = next;
        self.updated_at = change.changed_at;
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str) -> SourceFile {
        SourceFile::new(name, ContentType::Pdf, b"%PDF-1.4".to_vec())
    }

    #[test]
    fn test_new_item_waits_at_zero() {
        let item = BatchItem::new(pdf("a.pdf"));
        assert_eq!(item.status(), ItemStatus::Waiting);
        assert_eq!(item.progress(), 0);
    }

    #[test]
    fn test_terminal_item_rejects_further_transitions() {
        let mut item = BatchItem::new(pdf("a.pdf"));
        item.transition_to(ItemStatus::Duplicate).unwrap();
        item.transition_to(ItemStatus::Discarded).unwrap();

        let err = item.transition_to(ItemStatus::WaitingFinal).unwrap_err();
        assert!(matches!(err, BatchError::IllegalTransition { .. }));
        assert_eq!(item.status(), ItemStatus::Discarded);
        assert_eq!(item.progress(), 0);
    }

    #[test]
    fn test_preview_data_url_carries_mime() {
        let file = SourceFile::new("scan.png", ContentType::Png, vec![1, 2, 3]);
        assert_eq!(file.preview_data_url(), "data:image/png;base64,AQID");
    }
}
