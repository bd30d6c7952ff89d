//! Batch model and item pipeline tests (no timers)
//!
//! Walks a batch through the selection rule by hand, the way the controller
//! does, to pin down ordering and the duplicate branch.

use invoice_intake::models::{
    Batch, BatchSnapshot, BatchSummary, ContentType, DuplicateDecision, ItemStatus, NextAction,
    PhaseKind, SourceFile,
};
use invoice_intake::services::{sample_records, Admission, ItemPipeline};

fn pdf(name: &str) -> SourceFile {
    SourceFile::new(name, ContentType::Pdf, b"%PDF-1.7".to_vec())
}

/// Run every step of `plan` for `id` synchronously
fn finish(batch: &mut Batch, pipeline: &ItemPipeline, id: uuid::Uuid) {
    let plan = match batch.next_action() {
        NextAction::Admit(next) if next == id => {
            match pipeline.admit(batch.item(id).unwrap(), &sample_records()).unwrap() {
                Admission::Advance(plan) => plan,
                Admission::Duplicate(record) => panic!("unexpected duplicate of {}", record.id),
            }
        }
        NextAction::Resume(next) if next == id => pipeline.resume(batch.item(id).unwrap()).unwrap(),
        other => panic!("unexpected action {:?}", other),
    };

    batch.advance_item(id, plan.entry).unwrap();
    for step in plan.steps {
        batch.advance_item(id, step.status).unwrap();
    }
}

#[test]
fn test_selection_follows_insertion_order() {
    let pipeline = ItemPipeline::default();
    let mut batch = Batch::new();
    let ids = batch
        .enqueue(vec![pdf("alpha.pdf"), pdf("beta.pdf"), pdf("gamma.pdf")])
        .unwrap();

    assert_eq!(batch.next_action(), NextAction::Admit(ids[0]));

    batch.advance_item(ids[0], ItemStatus::Uploading).unwrap();
    assert_eq!(batch.next_action(), NextAction::Busy(ids[0]));

    batch.advance_item(ids[0], ItemStatus::Extracting).unwrap();
    batch.advance_item(ids[0], ItemStatus::Analyzing).unwrap();
    batch.advance_item(ids[0], ItemStatus::Complete).unwrap();

    finish(&mut batch, &pipeline, ids[1]);
    finish(&mut batch, &pipeline, ids[2]);

    assert_eq!(batch.next_action(), NextAction::Settle);
    assert!(batch.enter_summary());
    assert_eq!(batch.next_action(), NextAction::Idle);
}

#[test]
fn test_duplicate_branch_keep() {
    let pipeline = ItemPipeline::default();
    let records = sample_records();
    let mut batch = Batch::new();
    let ids = batch
        .enqueue(vec![pdf("uber-receipt.pdf"), pdf("alpha.pdf")])
        .unwrap();

    let record = match pipeline.admit(batch.item(ids[0]).unwrap(), &records).unwrap() {
        Admission::Duplicate(record) => record,
        Admission::Advance(_) => panic!("uber receipt should be held"),
    };
    assert_eq!(record.id, "INV-004");

    batch.hold_for_review(ids[0], record).unwrap();
    assert_eq!(batch.phase().kind(), PhaseKind::Duplicate);
    assert_eq!(batch.next_action(), NextAction::AwaitDecision(ids[0]));

    let (change, pending) = batch.resolve_duplicate(DuplicateDecision::Keep).unwrap();
    assert_eq!(change.new_status, ItemStatus::WaitingFinal);
    assert_eq!(pending.existing_record.vendor, "Uber");
    assert_eq!(batch.phase().kind(), PhaseKind::Processing);

    // The kept item is earlier in insertion order than the waiting one
    assert_eq!(batch.next_action(), NextAction::Resume(ids[0]));
    finish(&mut batch, &pipeline, ids[0]);
    finish(&mut batch, &pipeline, ids[1]);

    assert!(batch.enter_summary());
    let summary = BatchSummary::from(&batch);
    assert_eq!(summary.items.len(), 2);
    assert_eq!((summary.completed, summary.discarded), (2, 0));
}

#[test]
fn test_discarded_items_are_counted_not_listed() {
    let mut batch = Batch::new();
    let ids = batch.enqueue(vec![pdf("uber.pdf")]).unwrap();
    let record = sample_records().remove(3);

    batch.hold_for_review(ids[0], record).unwrap();
    let (change, _) = batch.resolve_duplicate(DuplicateDecision::Discard).unwrap();
    assert_eq!(change.new_status.progress(), 0);

    assert!(batch.enter_summary());
    let summary = BatchSummary::from(&batch);
    assert!(summary.items.is_empty());
    assert_eq!(summary.discarded, 1);

    let snapshot = BatchSnapshot::from(&batch);
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].status, ItemStatus::Discarded);
}

#[test]
fn test_terminal_items_reject_further_transitions() {
    let pipeline = ItemPipeline::default();
    let mut batch = Batch::new();
    let ids = batch.enqueue(vec![pdf("alpha.pdf")]).unwrap();
    finish(&mut batch, &pipeline, ids[0]);

    assert!(batch.advance_item(ids[0], ItemStatus::Analyzing).is_err());
    assert_eq!(batch.item(ids[0]).unwrap().status(), ItemStatus::Complete);
}

#[test]
fn test_summary_requires_every_item_settled() {
    let mut batch = Batch::new();
    let ids = batch.enqueue(vec![pdf("alpha.pdf")]).unwrap();
    batch.advance_item(ids[0], ItemStatus::Uploading).unwrap();

    assert!(!batch.enter_summary());
    assert_eq!(batch.phase().kind(), PhaseKind::Processing);
}

#[test]
fn test_reset_returns_to_drop_zone() {
    let mut batch = Batch::new();
    let id = batch.id();
    batch.enqueue(vec![pdf("a.pdf"), pdf("b.pdf")]).unwrap();

    assert_eq!(batch.reset(), 2);
    assert!(batch.is_empty());
    assert_eq!(batch.phase().kind(), PhaseKind::Upload);
    assert_eq!(batch.id(), id);
    assert_eq!(batch.next_action(), NextAction::Idle);
}

#[test]
fn test_snapshot_carries_batch_and_item_timestamps() {
    let mut batch = Batch::new();
    let ids = batch.enqueue(vec![pdf("alpha.pdf")]).unwrap();

    let before = BatchSnapshot::from(&batch);
    assert_eq!(before.created_at, batch.created_at());
    assert_eq!(before.items[0].updated_at, before.items[0].enqueued_at);

    batch.advance_item(ids[0], ItemStatus::Uploading).unwrap();
    let after = BatchSnapshot::from(&batch);
    assert!(after.items[0].updated_at >= before.items[0].updated_at);
    assert_eq!(after.created_at, before.created_at);
}
