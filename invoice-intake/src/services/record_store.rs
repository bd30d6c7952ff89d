//! Read-only store of existing invoice records
//!
//! Supplies the records duplicate detection compares against. Records come
//! from the configuration file, optionally preceded by the built-in sample set
//! the dashboard ships with.

use std::sync::Arc;

use crate::config::IntakeConfig;
use crate::models::ExistingRecord;

/// Shared, immutable list of existing records
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Arc<Vec<ExistingRecord>>,
}

impl RecordStore {
    pub fn new(records: Vec<ExistingRecord>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    /// Sample records first (if enabled), then configured records
    pub fn from_config(config: &IntakeConfig) -> Self {
        let mut records = Vec::new();
        if config.use_sample_records {
            records.extend(sample_records());
        }
        records.extend(config.records.iter().cloned());

        tracing::info!(
            records = records.len(),
            sample = config.use_sample_records,
            "Existing record store loaded"
        );

        Self::new(records)
    }

    pub fn records(&self) -> &[ExistingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&ExistingRecord> {
        self.records.iter().find(|record| record.id == id)
    }
}

/// Invoices already on file in the dashboard's demo data
pub fn sample_records() -> Vec<ExistingRecord> {
    const SAMPLES: [(&str, &str, &str, &str, f64); 8] = [
        ("INV-001", "Amazon Web Services", "Cloud Services", "2025-07-04", 1250.75),
        ("INV-002", "Figma", "Software", "2025-07-03", 180.0),
        ("INV-003", "The Coffee House", "Food & Drink", "2025-07-03", 25.5),
        ("INV-004", "Uber", "Travel", "2025-07-02", 45.3),
        ("INV-005", "Linear", "Software", "2025-07-01", 50.0),
        ("INV-006", "Indigo Airlines", "Travel", "2025-06-28", 7800.0),
        ("INV-007", "Local Office Supplies", "Office Supplies", "2025-06-25", 215.0),
        ("INV-008", "Zomato", "Food & Drink", "2025-06-24", 75.0),
    ];

    SAMPLES
        .iter()
        .map(|&(id, vendor, category, date, amount)| ExistingRecord {
            id: id.to_string(),
            vendor: vendor.to_string(),
            category: Some(category.to_string()),
            date: Some(date.to_string()),
            amount: Some(amount),
            preview_url: Some(format!(
                "https://placehold.co/600x800/EEE/31343C?text=Invoice+{}",
                id
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_records_contain_uber() {
        let store = RecordStore::new(sample_records());
        assert_eq!(store.len(), 8);
        assert_eq!(store.find_by_id("INV-004").unwrap().vendor, "Uber");
    }

    #[test]
    fn test_configured_records_follow_samples() {
        let config = IntakeConfig {
            records: vec![ExistingRecord::new("ACME-1", "Acme Corp")],
            ..IntakeConfig::default()
        };
        let store = RecordStore::from_config(&config);
        assert_eq!(store.records().last().unwrap().id, "ACME-1");

        let config = IntakeConfig {
            use_sample_records: false,
            records: vec![ExistingRecord::new("ACME-1", "Acme Corp")],
            ..IntakeConfig::default()
        };
        assert_eq!(RecordStore::from_config(&config).len(), 1);
    }
}
