//! Item persistence.
//!
//! The store is the single source of truth for item status. Every mutation
//! is conditional on the status the caller last observed, so two runs that
//! race on the same item cannot both win.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{ItemStatus, ItemType, MediaItem};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid stored JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Item {id} is {actual}, expected {expected}")]
    StatusMismatch {
        id: String,
        expected: ItemStatus,
        actual: ItemStatus,
    },

    #[error("Item {id} already exists as {existing}")]
    TypeConflict { id: String, existing: ItemType },

    #[error("Corrupt row for {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Result of recording a discovered item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New row in `pending`
    Inserted,

    /// Already known; nothing changed
    Existing,
}

/// Number of items per type and status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCount {
    pub item_type: ItemType,
    pub status: ItemStatus,
    pub count: usize,
}

/// A stored row that could not be decoded into an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptRow {
    pub external_id: String,
    pub reason: String,
}

/// Result of a listing query. Unreadable rows are set aside so one bad row
/// never hides the healthy ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub items: Vec<MediaItem>,
    pub corrupt: Vec<CorruptRow>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.corrupt.is_empty()
    }
}

impl From<Vec<MediaItem>> for Listing {
    fn from(items: Vec<MediaItem>) -> Self {
        Self {
            items,
            corrupt: Vec::new(),
        }
    }
}

/// Narrow typed repository over media items
pub trait ItemStore: Send + Sync {
    /// Insert a freshly discovered item; existing rows are never modified
    fn upsert_discovered(&self, item: &MediaItem) -> Result<UpsertOutcome, StoreError>;

    fn get(&self, external_id: &str) -> Result<Option<MediaItem>, StoreError>;

    /// Items in `status`, oldest digest timestamp first
    fn list_by_status(
        &self,
        status: ItemStatus,
        item_type: Option<ItemType>,
        limit: Option<usize>,
    ) -> Result<Listing, StoreError>;

    /// Items whose digest timestamp falls in `[start, end)`, any status
    fn list_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Listing, StoreError>;

    /// Persist the mutable lifecycle fields of `item` iff its stored status
    /// is still `expected`. `rating_manual` is not written.
    fn save_if_status(&self, item: &MediaItem, expected: ItemStatus) -> Result<(), StoreError>;

    /// Record the rating harvested from an exported note
    fn set_manual_rating(&self, external_id: &str, rating: Option<&str>) -> Result<(), StoreError>;

    fn status_counts(&self) -> Result<Vec<StatusCount>, StoreError>;
}

/// Sort key shared by both implementations
pub(crate) fn digest_order(a: &MediaItem, b: &MediaItem) -> std::cmp::Ordering {
    a.digest_timestamp()
        .cmp(&b.digest_timestamp())
        .then_with(|| a.external_id.cmp(&b.external_id))
}
