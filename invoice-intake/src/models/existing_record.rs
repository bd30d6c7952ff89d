//! Previously stored invoices, used only for duplicate comparison

use serde::{Deserialize, Serialize};

/// A previously stored invoice
///
/// Read-only from the intake workflow's point of view: it is matched against
/// new file names and shown next to the new upload during duplicate review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingRecord {
    /// Invoice identifier (e.g. "INV-004")
    pub id: String,

    /// Vendor label; its first word is what duplicate detection matches on
    pub vendor: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    /// Image shown in the side-by-side review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
}

impl ExistingRecord {
    /// Record with only the fields duplicate detection needs
    pub fn new(id: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vendor: vendor.into(),
            category: None,
            date: None,
            amount: None,
            preview_url: None,
        }
    }
}
