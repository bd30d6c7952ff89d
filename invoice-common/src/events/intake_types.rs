//! Intake workflow type definitions
//!
//! Status and phase vocabulary shared by the intake service and anything
//! consuming its event stream.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-file pipeline status
///
/// Each status maps to a fixed progress milestone, see [`ItemStatus::progress`].
/// `Complete` and `Discarded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Enqueued, not yet selected
    Waiting,
    /// Simulated upload in flight
    Uploading,
    /// Simulated text extraction
    Extracting,
    /// Simulated analysis / categorisation
    Analyzing,
    /// Held for a keep/discard decision
    Duplicate,
    /// Kept after a duplicate hold, waiting to be resumed
    WaitingFinal,
    /// Finished
    Complete,
    /// Dropped by the user after a duplicate hold
    Discarded,
}

impl ItemStatus {
    /// Progress milestone (0-100) for this status
    pub fn progress(self) -> u8 {
        match self {
            ItemStatus::Waiting => 0,
            ItemStatus::Uploading => 20,
            ItemStatus::Extracting => 40,
            ItemStatus::Duplicate => 60,
            ItemStatus::WaitingFinal => 60,
            ItemStatus::Analyzing => 80,
            ItemStatus::Complete => 100,
            ItemStatus::Discarded => 0,
        }
    }

    /// True for `Complete` and `Discarded`
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Complete | ItemStatus::Discarded)
    }

    /// True while the item is being advanced by a pipeline timer
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ItemStatus::Uploading | ItemStatus::Extracting | ItemStatus::Analyzing
        )
    }

    /// True when the controller may hand the item to the pipeline
    pub fn is_eligible(self) -> bool {
        matches!(self, ItemStatus::Waiting | ItemStatus::WaitingFinal)
    }

    /// Forward edges of the item state machine
    ///
    /// ```text
    /// waiting -> uploading -> extracting -> analyzing -> complete
    /// waiting -> duplicate -> waiting_final -> analyzing
    ///                      -> discarded
    /// ```
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Waiting, Uploading)
                | (Waiting, Duplicate)
                | (Uploading, Extracting)
                | (Extracting, Analyzing)
                | (Analyzing, Complete)
                | (Duplicate, WaitingFinal)
                | (Duplicate, Discarded)
                | (WaitingFinal, Analyzing)
        )
    }

    /// Wire name, matching the serde representation
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Waiting => "waiting",
            ItemStatus::Uploading => "uploading",
            ItemStatus::Extracting => "extracting",
            ItemStatus::Analyzing => "analyzing",
            ItemStatus::Duplicate => "duplicate",
            ItemStatus::WaitingFinal => "waiting_final",
            ItemStatus::Complete => "complete",
            ItemStatus::Discarded => "discarded",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch-level workflow phase, without payload
///
/// The intake service carries the pending duplicate inside its own phase
/// variant; this is the flattened form used on the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Upload,
    Processing,
    Duplicate,
    Summary,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseKind::Upload => "upload",
            PhaseKind::Processing => "processing",
            PhaseKind::Duplicate => "duplicate",
            PhaseKind::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// User decision for an item held as a possible duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateDecision {
    /// Save anyway: resume the item from analysis
    Keep,
    /// Drop the upload
    Discard,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ItemStatus; 8] = [
        ItemStatus::Waiting,
        ItemStatus::Uploading,
        ItemStatus::Extracting,
        ItemStatus::Analyzing,
        ItemStatus::Duplicate,
        ItemStatus::WaitingFinal,
        ItemStatus::Complete,
        ItemStatus::Discarded,
    ];

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        for from in [ItemStatus::Complete, ItemStatus::Discarded] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {} must be rejected", from, to);
            }
        }
    }

    #[test]
    fn test_forward_edges_never_lower_progress_except_discard() {
        for from in ALL {
            for to in ALL {
                if from.can_transition_to(to) && to != ItemStatus::Discarded {
                    assert!(
                        to.progress() >= from.progress(),
                        "{} -> {} lowers progress",
                        from,
                        to
                    );
                }
            }
        }
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_decision_deserializes_lowercase() {
        let keep: DuplicateDecision = serde_json::from_str("\"keep\"").unwrap();
        let discard: DuplicateDecision = serde_json::from_str("\"discard\"").unwrap();
        assert_eq!(keep, DuplicateDecision::Keep);
        assert_eq!(discard, DuplicateDecision::Discard);
    }
}
