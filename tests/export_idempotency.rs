//! Export Idempotency Integration Tests
//!
//! Re-running export must not rewrite notes, and notes carrying a manual
//! rating must never be overwritten.

mod common;

use std::fs;
use std::sync::Arc;

use common::{at, found, Harness, RatedSummarizer};
use media_digest::core::ExportScope;
use media_digest::domain::{ExportMark, ItemStatus, ItemType};
use media_digest::export::paths::{note_relative_path, read_relative_path};
use media_digest::store::{MemoryStore, SqliteStore};

fn harness() -> Harness {
    Harness::new(
        Arc::new(MemoryStore::new()),
        vec![
            found("ep-1", ItemType::Episode, at(2025, 10, 3, 6)),
            found("nl-1", ItemType::Newsletter, at(2025, 10, 3, 7)),
        ],
        RatedSummarizer::with_ratings(&[("ep-1", 4), ("nl-1", 2)]),
    )
}

#[tokio::test]
async fn test_second_export_writes_nothing() {
    let h = harness();
    let orchestrator = h.orchestrator();
    h.run_pipeline(&orchestrator).await;

    let exported = h.item("ep-1");
    assert_eq!(exported.status, ItemStatus::Exported);
    assert_eq!(exported.export_mark, Some(ExportMark::Written));
    assert!(exported.content_hash.is_some());

    let note = h
        .dir
        .path()
        .join("vault")
        .join(note_relative_path(&exported));
    let first = fs::read(&note).unwrap();
    assert!(String::from_utf8_lossy(&first).contains("rating_llm: 4"));

    h.clock.advance(chrono::Duration::hours(2));
    let report = orchestrator.export(ExportScope::All, false).await.unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.failed, 0);

    assert_eq!(fs::read(&note).unwrap(), first);
    assert_eq!(h.item("ep-1"), exported);
}

#[tokio::test]
async fn test_manual_rating_is_preserved_and_synced() {
    let h = harness();
    let orchestrator = h.orchestrator();
    h.run_pipeline(&orchestrator).await;

    let item = h.item("ep-1");
    let note = h.dir.path().join("vault").join(note_relative_path(&item));
    let edited = fs::read_to_string(&note)
        .unwrap()
        .replacen("rating:\n", "rating: 5\n", 1);
    fs::write(&note, &edited).unwrap();

    let report = orchestrator.export(ExportScope::All, false).await.unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(fs::read_to_string(&note).unwrap(), edited);

    let verified = h.item("ep-1");
    assert_eq!(verified.status, ItemStatus::Exported);
    assert_eq!(verified.export_mark, Some(ExportMark::Verified));
    assert_eq!(verified.content_hash, item.content_hash);

    let report = orchestrator.sync_ratings().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.item("ep-1").rating_manual.as_deref(), Some("5"));

    // Second sync has nothing new
    let report = orchestrator.sync_ratings().await.unwrap();
    assert_eq!(report.succeeded, 0);

    // Once the rating is recorded, export never touches the note again
    fs::remove_file(&note).unwrap();
    orchestrator.export(ExportScope::All, false).await.unwrap();
    assert!(!note.exists());
}

#[tokio::test]
async fn test_note_moved_to_read_is_found() {
    let h = harness();
    let orchestrator = h.orchestrator();
    h.run_pipeline(&orchestrator).await;

    let item = h.item("nl-1");
    let vault = h.dir.path().join("vault");
    let unread = vault.join(note_relative_path(&item));
    let read = vault.join(read_relative_path(&item));
    fs::create_dir_all(read.parent().unwrap()).unwrap();
    fs::rename(&unread, &read).unwrap();

    let report = orchestrator.export(ExportScope::All, false).await.unwrap();
    assert_eq!(report.succeeded, 0);
    assert!(!unread.exists());
    assert!(read.exists());
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let h = harness();
    let orchestrator = h.orchestrator();
    orchestrator.discover(None).await.unwrap();
    orchestrator.process(None, None, true).await.unwrap();
    orchestrator.summarize(None).await.unwrap();

    let report = orchestrator.export(ExportScope::New, true).await.unwrap();
    assert_eq!(report.succeeded, 2);

    let item = h.item("ep-1");
    assert_eq!(item.status, ItemStatus::Summarized);
    assert!(!h
        .dir
        .path()
        .join("vault")
        .join(note_relative_path(&item))
        .exists());
}

#[tokio::test]
async fn test_unwritable_vault_leaves_items_summarized() {
    let h = harness();
    let orchestrator = h.orchestrator();
    orchestrator.discover(None).await.unwrap();
    orchestrator.process(None, None, true).await.unwrap();
    orchestrator.summarize(None).await.unwrap();

    // A plain file where the export root directory should be
    fs::write(h.dir.path().join("vault"), "").unwrap();
    let before = h.item("ep-1");

    let report = orchestrator.export(ExportScope::New, false).await.unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.permanent_failures, 2);
    assert_eq!(report.exit_code(), 1);

    let after = h.item("ep-1");
    assert_eq!(after.status, ItemStatus::Summarized);
    assert_eq!(after, before);
    assert!(after.exported_at.is_none());
}

#[tokio::test]
async fn test_changed_summary_rewrites_note() {
    let h = harness();
    let orchestrator = h.orchestrator();
    h.run_pipeline(&orchestrator).await;

    let item = h.item("ep-1");
    let note = h.dir.path().join("vault").join(note_relative_path(&item));
    fs::write(&note, "stale body without front matter\n").unwrap();

    let report = orchestrator
        .export(ExportScope::Date(item.publish_date()), false)
        .await
        .unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(fs::read_to_string(&note)
        .unwrap()
        .contains("Summary of Title ep-1."));
}

#[tokio::test]
async fn test_export_state_survives_store_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = dir.path().join("media.db");

    let h = Harness::new(
        Arc::new(SqliteStore::open(&db).unwrap()),
        vec![found("ep-1", ItemType::Episode, at(2025, 10, 3, 6))],
        RatedSummarizer::default(),
    );
    let orchestrator = h.orchestrator();
    h.run_pipeline(&orchestrator).await;
    let exported = h.item("ep-1");
    drop(orchestrator);

    // A later invocation opens the database fresh
    let reopened = Harness {
        store: Arc::new(SqliteStore::open(&db).unwrap()),
        ..h
    };
    let orchestrator = reopened.orchestrator();
    let report = orchestrator.export(ExportScope::All, false).await.unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(reopened.item("ep-1").content_hash, exported.content_hash);
}
