//! Per-item pipeline
//!
//! Advances one batch item through its stages on a timed schedule, or halts it
//! for duplicate review. The pipeline never touches batch state: it decides
//! what should happen to an item (`admit`, `resume`) and runs timers that send
//! `StageTransition` requests back to the batch controller, which is the only
//! writer.
//!
//! Stage sequence for a new item:
//!
//! ```text
//! uploading@20 --upload--> extracting@40 --extract--> analyzing@80 --analyze--> complete@100
//! ```
//!
//! A kept duplicate skips straight to `analyzing@80 --analyze--> complete@100`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::{BatchError, BatchItem, ExistingRecord, ItemId, ItemStatus};
use crate::services::duplicate_policy::{DuplicatePolicy, VendorTokenPolicy};

/// Simulated latency of each stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTiming {
    /// uploading → extracting
    pub upload: Duration,
    /// extracting → analyzing
    pub extract: Duration,
    /// analyzing → complete
    pub analyze: Duration,
}

impl Default for StageTiming {
    fn default() -> Self {
        Self {
            upload: Duration::from_millis(800),
            extract: Duration::from_millis(1000),
            analyze: Duration::from_millis(800),
        }
    }
}

/// One timed step of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStep {
    /// Wait before applying `status`, measured from the previous step
    pub delay: Duration,
    pub status: ItemStatus,
}

/// Stage schedule for one item
///
/// `entry` is applied by the controller at hand-off; `steps` run on a timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    pub entry: ItemStatus,
    pub steps: Vec<StageStep>,
}

/// Outcome of admitting a `waiting` item
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Possible duplicate: hold the item at `duplicate@60` for review
    Duplicate(ExistingRecord),
    /// No collision: run the full stage plan
    Advance(StagePlan),
}

/// Request from a pipeline timer to move an item to `status`
///
/// `epoch` identifies the batch generation the timer was started in; the
/// controller drops requests from an earlier generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTransition {
    pub epoch: u64,
    pub item_id: ItemId,
    pub status: ItemStatus,
}

/// Item pipeline: admission decisions plus stage timers
#[derive(Clone)]
pub struct ItemPipeline {
    timing: StageTiming,
    policy: Arc<dyn DuplicatePolicy>,
}

impl Default for ItemPipeline {
    fn default() -> Self {
        Self::new(StageTiming::default())
    }
}

impl ItemPipeline {
    /// Pipeline using the vendor-token duplicate heuristic
    pub fn new(timing: StageTiming) -> Self {
        Self::with_policy(timing, Arc::new(VendorTokenPolicy))
    }

    pub fn with_policy(timing: StageTiming, policy: Arc<dyn DuplicatePolicy>) -> Self {
        Self { timing, policy }
    }

    /// Decide what happens to a newly selected item
    pub fn admit(
        &self,
        item: &BatchItem,
        records: &[ExistingRecord],
    ) -> Result<Admission, BatchError> {
        if item.status() != ItemStatus::Waiting {
            return Err(BatchError::IllegalTransition {
                item_id: item.id(),
                from: item.status(),
                to: ItemStatus::Uploading,
            });
        }

        match self.policy.find_match(item.source().name(), records) {
            Some(record) => Ok(Admission::Duplicate(record.clone())),
            None => Ok(Admission::Advance(self.advance_plan())),
        }
    }

    /// Stage plan for a kept duplicate
    pub fn resume(&self, item: &BatchItem) -> Result<StagePlan, BatchError> {
        if item.status() != ItemStatus::WaitingFinal {
            return Err(BatchError::IllegalTransition {
                item_id: item.id(),
                from: item.status(),
                to: ItemStatus::Analyzing,
            });
        }
        Ok(self.resume_plan())
    }

    /// Full sequence: uploading → extracting → analyzing → complete
    pub fn advance_plan(&self) -> StagePlan {
        StagePlan {
            entry: ItemStatus::Uploading,
            steps: vec![
                StageStep {
                    delay: self.timing.upload,
                    status: ItemStatus::Extracting,
                },
                StageStep {
                    delay: self.timing.extract,
                    status: ItemStatus::Analyzing,
                },
                StageStep {
                    delay: self.timing.analyze,
                    status: ItemStatus::Complete,
                },
            ],
        }
    }

    /// Shortened sequence after a keep decision: analyzing → complete
    pub fn resume_plan(&self) -> StagePlan {
        StagePlan {
            entry: ItemStatus::Analyzing,
            steps: vec![StageStep {
                delay: self.timing.analyze,
                status: ItemStatus::Complete,
            }],
        }
    }

    /// Run the timed steps of `plan` for one item
    ///
    /// Each step waits for its delay, then sends one transition request. The
    /// task ends early, without sending anything further, once `cancel` fires
    /// or the controller has gone away.
    pub fn spawn_steps(
        &self,
        item_id: ItemId,
        epoch: u64,
        plan: &StagePlan,
        cancel: CancellationToken,
        tx: mpsc::UnboundedSender<StageTransition>,
    ) -> JoinHandle<()> {
        let steps = plan.steps.clone();

        tokio::spawn(async move {
            for step in steps {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(item_id = %item_id, epoch, "Stage timers cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(step.delay) => {}
                }

                let request = StageTransition {
                    epoch,
                    item_id,
                    status: step.status,
                };
                if tx.send(request).is_err() {
                    tracing::debug!(item_id = %item_id, "Controller gone, stopping stage timers");
                    return;
                }
            }
        })
    }
}
