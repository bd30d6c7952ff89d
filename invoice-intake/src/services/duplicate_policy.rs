//! Duplicate detection for newly uploaded invoices
//!
//! Decides whether a new file likely represents an already-recorded invoice.
//! The heuristic is intentionally coarse: the lower-cased file name must
//! contain the first word of an existing record's vendor label. False
//! positives are expected, which is why a match only pauses the item for a
//! keep/discard decision and never rejects it outright.

use crate::models::ExistingRecord;

/// Matching strategy applied when an item is admitted to the pipeline
pub trait DuplicatePolicy: Send + Sync {
    /// Return the first record the file is suspected to duplicate
    fn find_match<'a>(
        &self,
        file_name: &str,
        records: &'a [ExistingRecord],
    ) -> Option<&'a ExistingRecord>;
}

/// File name contains the first word of the vendor label
#[derive(Debug, Clone, Copy, Default)]
pub struct VendorTokenPolicy;

impl DuplicatePolicy for VendorTokenPolicy {
    fn find_match<'a>(
        &self,
        file_name: &str,
        records: &'a [ExistingRecord],
    ) -> Option<&'a ExistingRecord> {
        find_duplicate(file_name, records)
    }
}

/// Lower-cased first whitespace-delimited token of a vendor label
///
/// A label without whitespace is its own token. Empty or whitespace-only
/// labels have no token and can never match.
pub fn vendor_token(vendor: &str) -> Option<String> {
    vendor.split_whitespace().next().map(str::to_lowercase)
}

/// First record (in iteration order) whose vendor token occurs in `file_name`
///
/// Matching is case-insensitive. An empty file name matches nothing.
pub fn find_duplicate<'a>(
    file_name: &str,
    records: &'a [ExistingRecord],
) -> Option<&'a ExistingRecord> {
    if file_name.is_empty() {
        return None;
    }

    let name = file_name.to_lowercase();
    records.iter().find(|record| {
        vendor_token(&record.vendor)
            .map(|token| name.contains(&token))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ExistingRecord> {
        vec![
            ExistingRecord::new("INV-001", "Amazon Web Services"),
            ExistingRecord::new("INV-004", "Uber"),
            ExistingRecord::new("INV-009", "Uber Eats"),
        ]
    }

    #[test]
    fn test_first_token_match_is_case_insensitive() {
        let records = records();
        let hit = find_duplicate("AMAZON-july.pdf", &records).unwrap();
        assert_eq!(hit.id, "INV-001");
    }

    #[test]
    fn test_first_match_in_iteration_order_wins() {
        let records = records();
        let hit = find_duplicate("uber-receipt.pdf", &records).unwrap();
        assert_eq!(hit.id, "INV-004");
    }

    #[test]
    fn test_only_first_word_of_vendor_counts() {
        let records = records();
        assert!(find_duplicate("web-services.pdf", &records).is_none());
    }

    #[test]
    fn test_empty_file_name_never_matches() {
        let records = records();
        assert!(find_duplicate("", &records).is_none());
    }

    #[test]
    fn test_blank_vendor_never_matches() {
        let records = vec![ExistingRecord::new("INV-X", "   ")];
        assert!(find_duplicate("anything.pdf", &records).is_none());
        assert_eq!(vendor_token("Figma"), Some("figma".to_string()));
        assert_eq!(vendor_token("  The Coffee House"), Some("the".to_string()));
    }

    #[test]
    fn test_policy_delegates_to_find_duplicate() {
        let records = records();
        let policy = VendorTokenPolicy;
        assert_eq!(
            policy.find_match("uber.png", &records).map(|r| r.id.as_str()),
            Some("INV-004")
        );
    }
}
