//! Capped, normalised tag set.

use serde::{Deserialize, Serialize};

/// Hard upper bound on tags per item
pub const MAX_TAGS: usize = 5;

/// Ordered set of at most [`MAX_TAGS`] tags.
///
/// Tags are trimmed, lowercased, have inner whitespace replaced by `-`, and
/// keep the order in which they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    /// Build a tag set capped at `limit` (never more than [`MAX_TAGS`])
    pub fn with_limit<I, S>(raw: I, limit: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let limit = limit.min(MAX_TAGS);
        let mut tags: Vec<String> = Vec::new();

        for tag in raw {
            if tags.len() >= limit {
                break;
            }
            if let Some(tag) = normalize(tag.as_ref()) {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }

        Self(tags)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::with_limit(iter, MAX_TAGS)
    }
}

fn normalize(raw: &str) -> Option<String> {
    let tag = raw
        .trim()
        .trim_start_matches('#')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();

    if tag.is_empty() {
        None
    } else {
        Some(tag)
    }
}
