//! Service modules for the upload batch workflow
//!
//! - `upload_surface`: screens dropped files before they enter a batch
//! - `duplicate_policy`: decides whether a file likely duplicates a record
//! - `item_pipeline`: per-item stage plans and timers
//! - `batch_controller`: owns a batch and drives its phase
//! - `record_store`: existing invoices to compare against

pub mod batch_controller;
pub mod duplicate_policy;
pub mod item_pipeline;
pub mod record_store;
pub mod upload_surface;

pub use batch_controller::BatchController;
pub use duplicate_policy::{find_duplicate, vendor_token, DuplicatePolicy, VendorTokenPolicy};
pub use item_pipeline::{
    Admission, ItemPipeline, StagePlan, StageStep, StageTiming, StageTransition,
};
pub use record_store::{sample_records, RecordStore};
pub use upload_surface::{detect_content_type, screen, IncomingFile, Screened, UploadError};
