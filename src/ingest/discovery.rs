//! Admission of discovered items.
//!
//! Collaborators report raw feed entries and messages. Before an entry
//! becomes a `pending` item it is trimmed, validated and checked against the
//! `--since` cutoff.

use chrono::{DateTime, Utc};

use crate::domain::{DiscoveredItem, MediaItem};

/// Placeholder for entries without a usable title
pub const UNTITLED: &str = "Untitled";

/// Outcome of admitting one discovered entry
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Ready to be stored as `pending`
    Admit(MediaItem),

    /// Published before the cutoff
    TooOld,

    /// Unusable entry (no identifier)
    Reject(String),
}

/// Normalise a discovered entry into a new item
pub fn admit(found: DiscoveredItem, since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Admission {
    let external_id = found.external_id.trim().to_string();
    if external_id.is_empty() {
        return Admission::Reject(format!("entry '{}' has no identifier", found.title.trim()));
    }

    if let (Some(cutoff), Some(published)) = (since, found.published_at) {
        if published < cutoff {
            return Admission::TooOld;
        }
    }

    let title = match found.title.trim() {
        "" => UNTITLED.to_string(),
        t => t.to_string(),
    };

    Admission::Admit(MediaItem::discovered(
        DiscoveredItem {
            external_id,
            item_type: found.item_type,
            title,
            author: non_empty(found.author),
            published_at: found.published_at,
            source_link: non_empty(found.source_link),
        },
        now,
    ))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemStatus, ItemType};
    use chrono::TimeZone;

    fn found(id: &str, title: &str, day: Option<u32>) -> DiscoveredItem {
        DiscoveredItem {
            external_id: id.to_string(),
            item_type: ItemType::Newsletter,
            title: title.to_string(),
            author: Some("  ".to_string()),
            published_at: day.map(|d| Utc.with_ymd_and_hms(2025, 10, d, 8, 0, 0).unwrap()),
            source_link: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 5, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_admit_normalises_fields() {
        let Admission::Admit(item) = admit(found(" msg-1 ", "  Roundup ", Some(3)), None, now()) else {
            panic!("expected admission");
        };
        assert_eq!(item.external_id, "msg-1");
        assert_eq!(item.title, "Roundup");
        assert_eq!(item.author, None);
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.discovered_at, now());
    }

    #[test]
    fn test_blank_id_is_rejected_and_blank_title_defaulted() {
        assert!(matches!(admit(found("", "x", None), None, now()), Admission::Reject(_)));

        let Admission::Admit(item) = admit(found("id", " ", None), None, now()) else {
            panic!("expected admission");
        };
        assert_eq!(item.title, UNTITLED);
    }

    #[test]
    fn test_since_cutoff() {
        let cutoff = Some(Utc.with_ymd_and_hms(2025, 10, 2, 0, 0, 0).unwrap());
        assert_eq!(admit(found("old", "x", Some(1)), cutoff, now()), Admission::TooOld);
        assert!(matches!(admit(found("new", "x", Some(3)), cutoff, now()), Admission::Admit(_)));
        // No publish date: cannot be judged old
        assert!(matches!(admit(found("undated", "x", None), cutoff, now()), Admission::Admit(_)));
    }
}
