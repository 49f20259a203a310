//! In-memory item store for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{digest_order, ItemStore, Listing, StatusCount, StoreError, UpsertOutcome};
use crate::domain::{ItemStatus, ItemType, MediaItem};

#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, MediaItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> Result<MutexGuard<'_, BTreeMap<String, MediaItem>>, StoreError> {
        self.items.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl ItemStore for MemoryStore {
    fn upsert_discovered(&self, item: &MediaItem) -> Result<UpsertOutcome, StoreError> {
        let mut items = self.items()?;
        if let Some(existing) = items.get(&item.external_id) {
            if existing.item_type != item.item_type {
                return Err(StoreError::TypeConflict {
                    id: item.external_id.clone(),
                    existing: existing.item_type,
                });
            }
            return Ok(UpsertOutcome::Existing);
        }
        items.insert(item.external_id.clone(), item.clone());
        Ok(UpsertOutcome::Inserted)
    }

    fn get(&self, external_id: &str) -> Result<Option<MediaItem>, StoreError> {
        Ok(self.items()?.get(external_id).cloned())
    }

    fn list_by_status(
        &self,
        status: ItemStatus,
        item_type: Option<ItemType>,
        limit: Option<usize>,
    ) -> Result<Listing, StoreError> {
        let mut matching: Vec<MediaItem> = self
            .items()?
            .values()
            .filter(|item| item.status == status)
            .filter(|item| item_type.map_or(true, |t| item.item_type == t))
            .cloned()
            .collect();
        matching.sort_by(digest_order);
        if let Some(limit) = limit {
            matching.truncate(limit);
        }
        Ok(matching.into())
    }

    fn list_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Listing, StoreError> {
        let mut matching: Vec<MediaItem> = self
            .items()?
            .values()
            .filter(|item| {
                let ts = item.digest_timestamp();
                ts >= start && ts < end
            })
            .cloned()
            .collect();
        matching.sort_by(digest_order);
        Ok(matching.into())
    }

    fn save_if_status(&self, item: &MediaItem, expected: ItemStatus) -> Result<(), StoreError> {
        let mut items = self.items()?;
        let stored = items
            .get_mut(&item.external_id)
            .ok_or_else(|| StoreError::NotFound(item.external_id.clone()))?;

        if stored.status != expected {
            return Err(StoreError::StatusMismatch {
                id: item.external_id.clone(),
                expected,
                actual: stored.status,
            });
        }

        let rating_manual = stored.rating_manual.take();
        *stored = MediaItem {
            rating_manual,
            ..item.clone()
        };
        Ok(())
    }

    fn set_manual_rating(&self, external_id: &str, rating: Option<&str>) -> Result<(), StoreError> {
        let mut items = self.items()?;
        let stored = items
            .get_mut(external_id)
            .ok_or_else(|| StoreError::NotFound(external_id.to_string()))?;
        stored.rating_manual = rating.map(str::to_string);
        Ok(())
    }

    fn status_counts(&self) -> Result<Vec<StatusCount>, StoreError> {
        let mut counts: BTreeMap<(ItemType, ItemStatus), usize> = BTreeMap::new();
        for item in self.items()?.values() {
            *counts.entry((item.item_type, item.status)).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((item_type, status), count)| StatusCount {
                item_type,
                status,
                count,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DiscoveredItem;
    use chrono::TimeZone;

    fn item(id: &str) -> MediaItem {
        MediaItem::discovered(
            DiscoveredItem {
                external_id: id.to_string(),
                item_type: ItemType::Episode,
                title: format!("Title {}", id),
                author: None,
                published_at: None,
                source_link: None,
            },
            Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_upsert_is_insert_once() {
        let store = MemoryStore::new();
        assert_eq!(store.upsert_discovered(&item("a")).unwrap(), UpsertOutcome::Inserted);

        let mut renamed = item("a");
        renamed.title = "Changed".to_string();
        assert_eq!(store.upsert_discovered(&renamed).unwrap(), UpsertOutcome::Existing);
        assert_eq!(store.get("a").unwrap().unwrap().title, "Title a");
    }

    #[test]
    fn test_save_is_conditional_on_status() {
        let store = MemoryStore::new();
        store.upsert_discovered(&item("a")).unwrap();

        let mut claimed = item("a");
        claimed.status = ItemStatus::InProgress;
        store.save_if_status(&claimed, ItemStatus::Pending).unwrap();

        let err = store.save_if_status(&claimed, ItemStatus::Pending).unwrap_err();
        assert!(matches!(err, StoreError::StatusMismatch { .. }));
    }

    #[test]
    fn test_save_never_touches_manual_rating() {
        let store = MemoryStore::new();
        store.upsert_discovered(&item("a")).unwrap();
        store.set_manual_rating("a", Some("4")).unwrap();

        let mut update = item("a");
        update.rating_manual = None;
        store.save_if_status(&update, ItemStatus::Pending).unwrap();

        assert_eq!(
            store.get("a").unwrap().unwrap().rating_manual.as_deref(),
            Some("4")
        );
    }
}
