//! Data models for invoice-intake
//!
//! - Batch items and their source files
//! - The batch arena and its phase state machine
//! - Existing invoice records used for duplicate comparison
//! - Read-only snapshot views for the presentation layer

pub mod batch;
pub mod batch_item;
pub mod existing_record;
pub mod snapshot;

pub use batch::{Batch, BatchError, BatchPhase, NextAction, PendingDuplicate};
pub use batch_item::{BatchItem, ContentType, ItemId, SourceFile, StatusChange};
pub use existing_record::ExistingRecord;
pub use snapshot::{BatchSnapshot, BatchSummary, DuplicateView, ItemView};
pub use invoice_common::events::{DuplicateDecision, ItemStatus, PhaseKind};
