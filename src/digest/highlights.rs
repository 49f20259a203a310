//! Per-item highlight data for digests.
//!
//! Highlights come from the summarizer's payload by default and can be
//! overridden per item from a JSON file keyed by external id.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{MediaItem, Theme};

/// Themes, actionables and takeaways for one item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemHighlights {
    #[serde(default)]
    pub themes: Vec<Theme>,

    #[serde(default)]
    pub actionables: Vec<String>,

    #[serde(default)]
    pub takeaways: Vec<String>,
}

impl ItemHighlights {
    pub fn is_empty(&self) -> bool {
        self.themes.is_empty() && self.actionables.is_empty() && self.takeaways.is_empty()
    }
}

/// Supplies highlights for digest entries
pub trait HighlightSource {
    fn highlights(&self, external_id: &str) -> Option<&ItemHighlights>;
}

/// Highlights keyed by external id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightMap(BTreeMap<String, ItemHighlights>);

impl HighlightMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the summary payloads of `items`
    pub fn from_payloads<'a>(items: impl IntoIterator<Item = &'a MediaItem>) -> Self {
        let mut map = BTreeMap::new();
        for item in items {
            let Some(payload) = &item.summary_payload else {
                continue;
            };
            let highlights = ItemHighlights {
                themes: payload.themes.clone(),
                actionables: payload.takeaways.clone(),
                takeaways: payload.takeaways.clone(),
            };
            if !highlights.is_empty() {
                map.insert(item.external_id.clone(), highlights);
            }
        }
        Self(map)
    }

    /// Load overrides from a JSON object `{ "<id>": { "themes": [...], ... } }`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read highlights file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse highlights file: {}", path.display()))
    }

    pub fn insert(&mut self, external_id: impl Into<String>, highlights: ItemHighlights) {
        self.0.insert(external_id.into(), highlights);
    }

    /// Replace entries with those from `overrides`, item by item
    pub fn overlay(mut self, overrides: HighlightMap) -> Self {
        self.0.extend(overrides.0);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl HighlightSource for HighlightMap {
    fn highlights(&self, external_id: &str) -> Option<&ItemHighlights> {
        self.0.get(external_id)
    }
}

/// Aggregate themes and actionables across items, in the given order.
///
/// Deduplicates case-insensitively (themes by title) and keeps at most
/// `limit` of each.
pub fn collect_daily<'a>(
    per_item: impl IntoIterator<Item = &'a ItemHighlights>,
    limit: usize,
) -> (Vec<Theme>, Vec<String>) {
    let mut themes: Vec<Theme> = Vec::new();
    let mut actionables: Vec<String> = Vec::new();
    let mut seen_themes: HashSet<String> = HashSet::new();
    let mut seen_actionables: HashSet<String> = HashSet::new();

    for highlights in per_item {
        for theme in &highlights.themes {
            if themes.len() >= limit {
                break;
            }
            let title = theme.title.trim();
            let summary = theme.summary.trim();
            if title.is_empty() || summary.is_empty() {
                continue;
            }
            if seen_themes.insert(title.to_lowercase()) {
                themes.push(Theme {
                    title: title.to_string(),
                    summary: summary.to_string(),
                });
            }
        }

        for actionable in &highlights.actionables {
            if actionables.len() >= limit {
                break;
            }
            let text = actionable.trim();
            if text.is_empty() {
                continue;
            }
            if seen_actionables.insert(text.to_lowercase()) {
                actionables.push(text.to_string());
            }
        }

        if themes.len() >= limit && actionables.len() >= limit {
            break;
        }
    }

    (themes, actionables)
}

/// First `n` non-empty takeaways of an item
pub fn top_takeaways(highlights: &ItemHighlights, n: usize) -> Vec<String> {
    highlights
        .takeaways
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .take(n)
        .map(str::to_string)
        .collect()
}
