//! Digest Integration Tests
//!
//! Daily and weekly digests built from a store populated by the real stages.

mod common;

use std::fs;
use std::sync::Arc;

use chrono::NaiveDate;
use common::{at, found, Harness, RatedSummarizer};
use media_digest::digest::{HighlightMap, ItemHighlights};
use media_digest::domain::ItemType;
use media_digest::export::paths::{daily_digest_relative_path, weekly_digest_relative_path};
use media_digest::store::MemoryStore;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
}

/// Week ending Friday 2025-10-03, ratings [2, 5, 5, 3] in publish order,
/// plus a newsletter whose processing failed on the Friday.
async fn populated() -> Harness {
    let h = Harness::new(
        Arc::new(MemoryStore::new()),
        vec![
            found("w1", ItemType::Episode, at(2025, 9, 29, 9)),
            found("w2", ItemType::Episode, at(2025, 9, 30, 9)),
            found("w3", ItemType::Newsletter, at(2025, 10, 1, 9)),
            found("w4", ItemType::Episode, at(2025, 10, 3, 8)),
            found("nl-x", ItemType::Newsletter, at(2025, 10, 3, 10)),
        ],
        RatedSummarizer::with_ratings(&[("w1", 2), ("w2", 5), ("w3", 5), ("w4", 3)]),
    );
    h.processor.fail("nl-x", "download timeout");

    let orchestrator = h.orchestrator();
    h.run_pipeline(&orchestrator).await;
    h
}

fn heading_position(content: &str, title: &str) -> usize {
    content
        .find(&format!("### [{}]", title))
        .unwrap_or_else(|| panic!("{} not listed", title))
}

#[tokio::test]
async fn test_daily_digest_is_byte_identical_on_rebuild() {
    let h = populated().await;
    let orchestrator = h.orchestrator();

    let report = orchestrator.build_daily(Some(day(3)), None).await.unwrap();
    assert_eq!(report.succeeded, 1);
    let path = report.artifact.clone().unwrap();
    assert_eq!(
        path,
        h.dir
            .path()
            .join("vault")
            .join(daily_digest_relative_path(day(3)))
    );
    let first = fs::read(&path).unwrap();

    // Unchanged input: the file is left alone
    h.clock.advance(chrono::Duration::hours(5));
    let report = orchestrator.build_daily(Some(day(3)), None).await.unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.skipped, 1);

    // Rebuilt from scratch: same bytes
    fs::remove_file(&path).unwrap();
    orchestrator.build_daily(Some(day(3)), None).await.unwrap();
    assert_eq!(fs::read(&path).unwrap(), first);
}

#[tokio::test]
async fn test_daily_digest_lists_failures_separately() {
    let h = populated().await;
    let orchestrator = h.orchestrator();

    let report = orchestrator.build_daily(None, None).await.unwrap();
    let content = fs::read_to_string(report.artifact.unwrap()).unwrap();

    let (items, failures) = content.split_once("## Failures").unwrap();
    assert!(items.contains("### [Title w4]"));
    assert!(!items.contains("Title nl-x"));
    assert!(failures.contains("**Title nl-x** (Newsletter): download timeout"));

    // Earlier days are outside the daily window
    assert!(!content.contains("Title w1"));
    assert!(content.ends_with('\n') && !content.ends_with("\n\n"));
}

#[tokio::test]
async fn test_weekly_digest_orders_by_rating_then_recency() {
    let h = populated().await;
    let orchestrator = h.orchestrator();

    // Saturday: the default week is the one ending on the preceding Friday
    h.clock.set(at(2025, 10, 4, 12));
    let report = orchestrator.build_weekly(None, None).await.unwrap();
    let path = report.artifact.unwrap();
    assert_eq!(
        path,
        h.dir
            .path()
            .join("vault")
            .join(weekly_digest_relative_path(day(3)))
    );
    let content = fs::read_to_string(&path).unwrap();

    let order: Vec<usize> = ["Title w3", "Title w2", "Title w4", "Title w1"]
        .iter()
        .map(|title| heading_position(&content, title))
        .collect();
    let mut sorted = order.clone();
    sorted.sort_unstable();
    assert_eq!(order, sorted);

    assert!(content.contains("## Takeaways"));
    assert!(content.contains("- Takeaway from w2"));
    assert!(content.contains("download timeout"));
}

#[tokio::test]
async fn test_highlight_overrides_replace_generated_highlights() {
    let h = populated().await;
    let orchestrator = h.orchestrator();

    let mut overrides = HighlightMap::new();
    overrides.insert(
        "w4",
        ItemHighlights {
            themes: Vec::new(),
            actionables: vec!["Try the new eval harness".to_string()],
            takeaways: Vec::new(),
        },
    );

    let report = orchestrator
        .build_daily(Some(day(3)), Some(overrides))
        .await
        .unwrap();
    let content = fs::read_to_string(report.artifact.unwrap()).unwrap();

    assert!(content.contains("## Actionables"));
    assert!(content.contains("- [ ] Try the new eval harness"));
    assert!(!content.contains("- [ ] Takeaway from w4"));
}
