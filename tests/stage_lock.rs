//! Stage Lock Integration Tests
//!
//! A stage whose lock is held by another invocation does no work and reports
//! itself as locked.

mod common;

use std::sync::Arc;

use common::{at, found, Harness, RatedSummarizer};
use media_digest::core::{ExportScope, Stage, StageLock};
use media_digest::domain::{ItemStatus, ItemType};
use media_digest::store::MemoryStore;

fn harness() -> Harness {
    Harness::new(
        Arc::new(MemoryStore::new()),
        vec![found("ep-1", ItemType::Episode, at(2025, 10, 3, 6))],
        RatedSummarizer::default(),
    )
}

#[tokio::test]
async fn test_overlapping_export_is_a_no_op() {
    let h = harness();
    let orchestrator = h.orchestrator();
    orchestrator.discover(None).await.unwrap();
    orchestrator.process(None, None, true).await.unwrap();
    orchestrator.summarize(None).await.unwrap();

    let held = StageLock::try_acquire(&h.settings().lock_dir, Stage::Export)
        .unwrap()
        .unwrap();

    let report = orchestrator.export(ExportScope::New, false).await.unwrap();
    assert!(report.locked);
    assert_eq!(report.succeeded + report.skipped + report.failed, 0);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.to_string(), "export: locked (another run in progress)");
    assert_eq!(h.item("ep-1").status, ItemStatus::Summarized);

    drop(held);
    let report = orchestrator.export(ExportScope::New, false).await.unwrap();
    assert!(!report.locked);
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.item("ep-1").status, ItemStatus::Exported);
}

#[tokio::test]
async fn test_process_locks_are_per_type() {
    let h = Harness::new(
        Arc::new(MemoryStore::new()),
        vec![
            found("ep-1", ItemType::Episode, at(2025, 10, 3, 6)),
            found("nl-1", ItemType::Newsletter, at(2025, 10, 3, 7)),
        ],
        RatedSummarizer::default(),
    );
    let orchestrator = h.orchestrator();
    orchestrator.discover(None).await.unwrap();

    let _held = StageLock::try_acquire(&h.settings().lock_dir, Stage::Process(ItemType::Episode))
        .unwrap()
        .unwrap();

    let report = orchestrator.process(None, None, true).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.item("ep-1").status, ItemStatus::Pending);
    assert_eq!(h.item("nl-1").status, ItemStatus::Completed);
}

#[tokio::test]
async fn test_locked_digest_leaves_no_file() {
    let h = harness();
    let orchestrator = h.orchestrator();

    let _held = StageLock::try_acquire(&h.settings().lock_dir, Stage::DigestDaily)
        .unwrap()
        .unwrap();

    let report = orchestrator.build_daily(None, None).await.unwrap();
    assert!(report.locked);
    assert!(report.artifact.is_none());
    assert!(!h.dir.path().join("vault").exists());
}
