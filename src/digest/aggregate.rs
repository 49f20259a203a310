//! Digest selection and ordering.
//!
//! Pure: the same items, window and highlights always produce the same
//! digest.

use std::cmp::Ordering;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::highlights::{collect_daily, top_takeaways, HighlightSource};
use super::window::{DigestKind, DigestWindow};
use crate::domain::{ItemStatus, ItemType, MediaItem, Theme};
use crate::export::paths::{note_relative_path, relative_link};

/// Highlight limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestSettings {
    /// Takeaways shown per item in weekly digests
    #[serde(default = "default_takeaways_per_item")]
    pub takeaways_per_item: usize,

    /// Themes and actionables kept in daily digests
    #[serde(default = "default_highlight_limit")]
    pub highlight_limit: usize,
}

fn default_takeaways_per_item() -> usize {
    3
}

fn default_highlight_limit() -> usize {
    5
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            takeaways_per_item: default_takeaways_per_item(),
            highlight_limit: default_highlight_limit(),
        }
    }
}

/// One item in the main list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub external_id: String,
    pub item_type: ItemType,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub rating_llm: u8,
    pub summary: String,
    /// Link from the digest file to the item's note
    pub note_link: String,
    pub source_link: Option<String>,
    /// Weekly only
    pub takeaways: Vec<String>,
}

/// A failed item surfaced for attention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    pub external_id: String,
    pub item_type: ItemType,
    pub title: String,
    pub error_reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub window: DigestWindow,
    pub entries: Vec<DigestEntry>,
    pub failures: Vec<FailureEntry>,
    pub themes: Vec<Theme>,
    /// Daily only
    pub actionables: Vec<String>,
}

/// Build a digest from the items selected for `window`.
///
/// `digest_dir` is the digest file's directory relative to the export root,
/// used to compute note links.
pub fn aggregate(
    window: DigestWindow,
    items: &[MediaItem],
    highlights: &dyn HighlightSource,
    settings: &DigestSettings,
    digest_dir: &Path,
) -> Digest {
    let selected: Vec<&MediaItem> = items
        .iter()
        .filter(|item| window.contains(item.digest_timestamp()))
        .collect();

    let mut listed: Vec<&MediaItem> = selected
        .iter()
        .copied()
        .filter(|item| {
            matches!(item.status, ItemStatus::Summarized | ItemStatus::Exported)
                && item.summary_payload.is_some()
        })
        .collect();

    match window.kind {
        DigestKind::Daily => listed.sort_by(|a, b| chronological(a, b)),
        DigestKind::Weekly => listed.sort_by(|a, b| by_rating(a, b)),
    }

    let mut failed: Vec<&MediaItem> = selected
        .iter()
        .copied()
        .filter(|item| item.status == ItemStatus::Failed)
        .collect();
    failed.sort_by(|a, b| chronological(a, b));

    let entries: Vec<DigestEntry> = listed
        .iter()
        .map(|item| {
            let takeaways = match window.kind {
                DigestKind::Weekly => highlights
                    .highlights(&item.external_id)
                    .map(|h| top_takeaways(h, settings.takeaways_per_item))
                    .unwrap_or_default(),
                DigestKind::Daily => Vec::new(),
            };
            entry(item, digest_dir, takeaways)
        })
        .collect();

    let failures = failed
        .iter()
        .map(|item| FailureEntry {
            external_id: item.external_id.clone(),
            item_type: item.item_type,
            title: item.title.clone(),
            error_reason: item.error_reason.clone().unwrap_or_default(),
        })
        .collect();

    let per_item = listed
        .iter()
        .filter_map(|item| highlights.highlights(&item.external_id));
    let (themes, actionables) = collect_daily(per_item, settings.highlight_limit);
    let actionables = match window.kind {
        DigestKind::Daily => actionables,
        DigestKind::Weekly => Vec::new(),
    };

    Digest {
        window,
        entries,
        failures,
        themes,
        actionables,
    }
}

fn entry(item: &MediaItem, digest_dir: &Path, takeaways: Vec<String>) -> DigestEntry {
    let summary = item
        .summary_payload
        .as_ref()
        .map(|p| first_paragraph(&p.summary))
        .unwrap_or_default();

    DigestEntry {
        external_id: item.external_id.clone(),
        item_type: item.item_type,
        title: item.title.trim().to_string(),
        timestamp: item.digest_timestamp(),
        rating_llm: item.rating_llm(),
        summary,
        note_link: relative_link(digest_dir, &note_relative_path(item)),
        source_link: item.source_link.clone(),
        takeaways,
    }
}

fn first_paragraph(text: &str) -> String {
    text.trim()
        .split("\n\n")
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Oldest first, ties by id
fn chronological(a: &MediaItem, b: &MediaItem) -> Ordering {
    a.digest_timestamp()
        .cmp(&b.digest_timestamp())
        .then_with(|| a.external_id.cmp(&b.external_id))
}

/// Highest rating first, then newest, then id
fn by_rating(a: &MediaItem, b: &MediaItem) -> Ordering {
    b.rating_llm()
        .cmp(&a.rating_llm())
        .then_with(|| b.digest_timestamp().cmp(&a.digest_timestamp()))
        .then_with(|| a.external_id.cmp(&b.external_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::highlights::{HighlightMap, ItemHighlights};
    use crate::domain::{DiscoveredItem, SummaryPayload};
    use chrono::{NaiveDate, TimeZone};

    fn item(id: &str, day: u32, hour: u32, status: ItemStatus, rating: u8) -> MediaItem {
        let mut item = MediaItem::discovered(
            DiscoveredItem {
                external_id: id.to_string(),
                item_type: ItemType::Episode,
                title: format!("Episode {}", id),
                author: Some("Show".to_string()),
                published_at: Some(Utc.with_ymd_and_hms(2025, 10, day, hour, 0, 0).unwrap()),
                source_link: None,
            },
            Utc.with_ymd_and_hms(2025, 10, 5, 0, 0, 0).unwrap(),
        );
        item.status = status;
        if matches!(status, ItemStatus::Summarized | ItemStatus::Exported) {
            let payload: SummaryPayload = serde_json::from_str(&format!(
                r#"{{"summary": "Summary of {}", "rating_llm": {}}}"#,
                id, rating
            ))
            .unwrap();
            item.summary_payload = Some(payload);
        }
        item
    }

    fn dir() -> &'static Path {
        Path::new("unread/Daily summary")
    }

    #[test]
    fn test_daily_is_chronological_and_excludes_unsummarized() {
        let items = vec![
            item("late", 1, 18, ItemStatus::Exported, 2),
            item("early", 1, 6, ItemStatus::Summarized, 5),
            item("pending", 1, 9, ItemStatus::Pending, 0),
            item("other-day", 2, 9, ItemStatus::Exported, 5),
        ];
        let window = DigestWindow::daily(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        let digest = aggregate(window, &items, &HighlightMap::new(), &DigestSettings::default(), dir());

        let ids: Vec<&str> = digest.entries.iter().map(|e| e.external_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(digest.entries[0].note_link, "../Podcasts/2025-10-01_Show_Episode_early.md");
    }

    #[test]
    fn test_weekly_orders_by_rating_then_recency() {
        let items = vec![
            item("r2", 1, 9, ItemStatus::Exported, 2),
            item("r5-old", 2, 9, ItemStatus::Exported, 5),
            item("r5-new", 3, 9, ItemStatus::Exported, 5),
            item("r3", 4, 9, ItemStatus::Exported, 3),
        ];
        let window = DigestWindow::weekly(NaiveDate::from_ymd_opt(2025, 10, 4).unwrap());
        let digest = aggregate(window, &items, &HighlightMap::new(), &DigestSettings::default(), dir());

        let ids: Vec<&str> = digest.entries.iter().map(|e| e.external_id.as_str()).collect();
        assert_eq!(ids, vec!["r5-new", "r5-old", "r3", "r2"]);
    }

    #[test]
    fn test_failures_carry_reason_and_skips_are_hidden() {
        let mut failed = item("broken", 1, 9, ItemStatus::Failed, 0);
        failed.error_reason = Some("download timeout".to_string());
        let skipped = item("meh", 1, 10, ItemStatus::Skipped, 0);

        let window = DigestWindow::daily(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        let digest = aggregate(
            window,
            &[failed, skipped],
            &HighlightMap::new(),
            &DigestSettings::default(),
            dir(),
        );

        assert!(digest.entries.is_empty());
        assert_eq!(digest.failures.len(), 1);
        assert_eq!(digest.failures[0].error_reason, "download timeout");
    }

    #[test]
    fn test_weekly_takeaways_are_capped_per_item() {
        let items = vec![item("a", 2, 9, ItemStatus::Exported, 4)];
        let mut highlights = HighlightMap::new();
        highlights.insert(
            "a",
            ItemHighlights {
                takeaways: (1..=5).map(|i| format!("T{}", i)).collect(),
                ..Default::default()
            },
        );

        let window = DigestWindow::weekly(NaiveDate::from_ymd_opt(2025, 10, 3).unwrap());
        let digest = aggregate(window, &items, &highlights, &DigestSettings::default(), dir());
        assert_eq!(digest.entries[0].takeaways, vec!["T1", "T2", "T3"]);
        assert!(digest.actionables.is_empty());
    }
}
