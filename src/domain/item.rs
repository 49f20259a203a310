//! The media item record and its status vocabulary.
//!
//! Episodes and newsletters share one record shape; `item_type` is the only
//! discriminant and stage logic branches on it once.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::summary::SummaryPayload;
use super::tags::Tags;

/// Kind of content an item represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Podcast episode (downloaded and transcribed)
    Episode,

    /// Email newsletter (parsed from HTML/text)
    Newsletter,
}

impl ItemType {
    pub const ALL: [ItemType; 2] = [ItemType::Episode, ItemType::Newsletter];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Episode => "episode",
            ItemType::Newsletter => "newsletter",
        }
    }

    /// Value written to the `type:` field of exported notes
    pub fn note_type(&self) -> &'static str {
        match self {
            ItemType::Episode => "podcast",
            ItemType::Newsletter => "newsletter",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "episode" | "podcast" => Ok(ItemType::Episode),
            "newsletter" | "email" => Ok(ItemType::Newsletter),
            _ => anyhow::bail!("Unknown item type: {}", s),
        }
    }
}

/// Lifecycle status of an item.
///
/// `exported` and `skipped` are terminal. `failed` is terminal only once the
/// retry ceiling is reached and nobody retries the item manually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    InProgress,
    Completed,
    Summarized,
    Exported,
    Failed,
    Skipped,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 7] = [
        ItemStatus::Pending,
        ItemStatus::InProgress,
        ItemStatus::Completed,
        ItemStatus::Summarized,
        ItemStatus::Exported,
        ItemStatus::Failed,
        ItemStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Completed => "completed",
            ItemStatus::Summarized => "summarized",
            ItemStatus::Exported => "exported",
            ItemStatus::Failed => "failed",
            ItemStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Exported | ItemStatus::Skipped)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        ItemStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown item status: {}", s))
    }
}

/// How the exporter last settled an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMark {
    /// The note was written from the current summary
    Written,

    /// The note carries a manual edit and was left untouched
    Verified,
}

impl ExportMark {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportMark::Written => "written",
            ExportMark::Verified => "verified",
        }
    }
}

impl FromStr for ExportMark {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "written" => Ok(ExportMark::Written),
            "verified" => Ok(ExportMark::Verified),
            _ => anyhow::bail!("Unknown export mark: {}", s),
        }
    }
}

/// An item as reported by a discovery collaborator (feed entry or message)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    /// Feed GUID or message identifier
    pub external_id: String,

    pub item_type: ItemType,

    pub title: String,

    /// Show name or newsletter sender
    #[serde(default)]
    pub author: Option<String>,

    /// Publication time, when the source provides a reliable one
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,

    /// Link back to the original content
    #[serde(default)]
    pub source_link: Option<String>,
}

/// A podcast episode or newsletter tracked through the lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Stable identifier from the source (primary key)
    pub external_id: String,

    pub item_type: ItemType,

    pub title: String,

    pub author: Option<String>,

    pub published_at: Option<DateTime<Utc>>,

    /// When discovery first saw this item
    pub discovered_at: DateTime<Utc>,

    pub source_link: Option<String>,

    pub status: ItemStatus,

    /// Failed attempts since the last success or manual retry
    pub attempt_count: u32,

    pub error_reason: Option<String>,

    /// Hash of the note content last written by the exporter
    pub content_hash: Option<String>,

    pub summary_payload: Option<SummaryPayload>,

    /// Rating the user typed into the exported note
    pub rating_manual: Option<String>,

    pub exported_at: Option<DateTime<Utc>>,

    pub export_mark: Option<ExportMark>,

    pub tags: Tags,

    /// Output of the processing stage (transcript or parsed text location)
    pub artifact_path: Option<String>,

    pub last_attempt_at: Option<DateTime<Utc>>,

    pub updated_at: DateTime<Utc>,
}

impl MediaItem {
    /// Create a fresh `pending` item from a discovery result
    pub fn discovered(item: DiscoveredItem, now: DateTime<Utc>) -> Self {
        Self {
            external_id: item.external_id,
            item_type: item.item_type,
            title: item.title,
            author: item.author,
            published_at: item.published_at,
            discovered_at: now,
            source_link: item.source_link,
            status: ItemStatus::Pending,
            attempt_count: 0,
            error_reason: None,
            content_hash: None,
            summary_payload: None,
            rating_manual: None,
            exported_at: None,
            export_mark: None,
            tags: Tags::default(),
            artifact_path: None,
            last_attempt_at: None,
            updated_at: now,
        }
    }

    /// Timestamp used for digest windows and note naming.
    ///
    /// Newsletters without a reliable publish time fall back to discovery.
    pub fn digest_timestamp(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.discovered_at)
    }

    pub fn publish_date(&self) -> NaiveDate {
        self.digest_timestamp().date_naive()
    }

    /// LLM rating, 0 when the item has not been summarized
    pub fn rating_llm(&self) -> u8 {
        self.summary_payload
            .as_ref()
            .map(|payload| payload.rating_llm)
            .unwrap_or(0)
    }
}
