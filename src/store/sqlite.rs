//! SQLite-backed item store.
//!
//! One table per item type (`episodes`, `newsletters`) with identical
//! columns. Timestamps are stored as RFC 3339 UTC strings with second
//! precision so that lexical order matches chronological order.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use super::{digest_order, CorruptRow, ItemStore, Listing, StatusCount, StoreError, UpsertOutcome};
use crate::domain::{ExportMark, ItemStatus, ItemType, MediaItem, SummaryPayload, Tags};

const SCHEMA_VERSION: i64 = 1;

const COLUMNS: &str = "external_id, title, author, published_at, discovered_at, source_link, \
     status, attempt_count, error_reason, content_hash, summary_payload, rating_manual, \
     exported_at, export_mark, tags, artifact_path, last_attempt_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=5000;
        ",
        )?;

        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;

        let mut ddl = String::from(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);\n",
        );
        for item_type in ItemType::ALL {
            let table = table(item_type);
            ddl.push_str(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    external_id TEXT PRIMARY KEY,
                    item_type TEXT NOT NULL DEFAULT '{kind}' CHECK (item_type = '{kind}'),
                    title TEXT NOT NULL,
                    author TEXT,
                    published_at TEXT,
                    discovered_at TEXT NOT NULL,
                    source_link TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    attempt_count INTEGER NOT NULL DEFAULT 0,
                    error_reason TEXT,
                    content_hash TEXT,
                    summary_payload TEXT,
                    rating_manual TEXT,
                    exported_at TEXT,
                    export_mark TEXT,
                    tags TEXT NOT NULL DEFAULT '[]',
                    artifact_path TEXT,
                    last_attempt_at TEXT,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_status_type ON {table}(status, item_type);
                CREATE INDEX IF NOT EXISTS idx_{table}_published ON {table}(published_at);
                "#,
                table = table,
                kind = item_type.as_str(),
            ));
        }
        conn.execute_batch(&ddl)?;

        let version: Option<i64> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .optional()?
            .flatten();
        if version.is_none() {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
            debug!(version = SCHEMA_VERSION, "Initialised item store schema");
        }

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn find_in(
        conn: &Connection,
        item_type: ItemType,
        external_id: &str,
    ) -> Result<Option<MediaItem>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE external_id = ?1",
            COLUMNS,
            table(item_type)
        );
        let raw = conn
            .query_row(&sql, params![external_id], RawItem::from_row)
            .optional()?;
        raw.map(|raw| raw.into_item(item_type)).transpose()
    }

    fn find(conn: &Connection, external_id: &str) -> Result<Option<MediaItem>, StoreError> {
        for item_type in ItemType::ALL {
            if let Some(item) = Self::find_in(conn, item_type, external_id)? {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// Rows matching `filter`; rows that fail to decode are set aside
    fn query_items(
        conn: &Connection,
        item_type: ItemType,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
        listing: &mut Listing,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            COLUMNS,
            table(item_type),
            filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, |row| Ok((row.get::<_, String>(0)?, RawItem::from_row(row))))?
            .collect::<Result<Vec<_>, _>>()?;

        for (external_id, raw) in rows {
            let decoded = raw
                .map_err(StoreError::from)
                .and_then(|raw| raw.into_item(item_type));
            match decoded {
                Ok(item) => listing.items.push(item),
                Err(e) => {
                    warn!(
                        id = %external_id,
                        table = table(item_type),
                        error = %e,
                        "Skipping unreadable row"
                    );
                    listing.corrupt.push(CorruptRow {
                        external_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl ItemStore for SqliteStore {
    fn upsert_discovered(&self, item: &MediaItem) -> Result<UpsertOutcome, StoreError> {
        let conn = self.conn()?;

        for other in ItemType::ALL.into_iter().filter(|t| *t != item.item_type) {
            if Self::find_in(&conn, other, &item.external_id)?.is_some() {
                return Err(StoreError::TypeConflict {
                    id: item.external_id.clone(),
                    existing: other,
                });
            }
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, \
             ?13, ?14, ?15, ?16, ?17, ?18) ON CONFLICT(external_id) DO NOTHING",
            table(item.item_type),
            COLUMNS
        );
        let payload = item
            .summary_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let inserted = conn.execute(
            &sql,
            params![
                item.external_id,
                item.title,
                item.author,
                item.published_at.map(ts),
                ts(item.discovered_at),
                item.source_link,
                item.status.as_str(),
                item.attempt_count,
                item.error_reason,
                item.content_hash,
                payload,
                item.rating_manual,
                item.exported_at.map(ts),
                item.export_mark.map(|m| m.as_str()),
                serde_json::to_string(&item.tags)?,
                item.artifact_path,
                item.last_attempt_at.map(ts),
                ts(item.updated_at),
            ],
        )?;

        Ok(if inserted == 1 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Existing
        })
    }

    fn get(&self, external_id: &str) -> Result<Option<MediaItem>, StoreError> {
        let conn = self.conn()?;
        Self::find(&conn, external_id)
    }

    fn list_by_status(
        &self,
        status: ItemStatus,
        item_type: Option<ItemType>,
        limit: Option<usize>,
    ) -> Result<Listing, StoreError> {
        let conn = self.conn()?;
        let types: Vec<ItemType> = match item_type {
            Some(t) => vec![t],
            None => ItemType::ALL.to_vec(),
        };

        let mut listing = Listing::default();
        for t in types {
            Self::query_items(&conn, t, "status = ?1", &[&status.as_str()], &mut listing)?;
        }
        listing.items.sort_by(digest_order);
        if let Some(limit) = limit {
            listing.items.truncate(limit);
        }
        Ok(listing)
    }

    fn list_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Listing, StoreError> {
        let conn = self.conn()?;
        let (start, end) = (ts(start), ts(end));

        let mut listing = Listing::default();
        for t in ItemType::ALL {
            Self::query_items(
                &conn,
                t,
                "COALESCE(published_at, discovered_at) >= ?1 \
                 AND COALESCE(published_at, discovered_at) < ?2",
                &[&start, &end],
                &mut listing,
            )?;
        }
        listing.items.sort_by(digest_order);
        Ok(listing)
    }

    fn save_if_status(&self, item: &MediaItem, expected: ItemStatus) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "UPDATE {} SET status = ?1, attempt_count = ?2, error_reason = ?3, \
             content_hash = ?4, summary_payload = ?5, exported_at = ?6, export_mark = ?7, \
             tags = ?8, artifact_path = ?9, last_attempt_at = ?10, updated_at = ?11 \
             WHERE external_id = ?12 AND status = ?13",
            table(item.item_type)
        );
        let payload = item
            .summary_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let updated = conn.execute(
            &sql,
            params![
                item.status.as_str(),
                item.attempt_count,
                item.error_reason,
                item.content_hash,
                payload,
                item.exported_at.map(ts),
                item.export_mark.map(|m| m.as_str()),
                serde_json::to_string(&item.tags)?,
                item.artifact_path,
                item.last_attempt_at.map(ts),
                ts(item.updated_at),
                item.external_id,
                expected.as_str(),
            ],
        )?;

        if updated == 1 {
            return Ok(());
        }

        match Self::find_in(&conn, item.item_type, &item.external_id)? {
            Some(stored) => Err(StoreError::StatusMismatch {
                id: item.external_id.clone(),
                expected,
                actual: stored.status,
            }),
            None => Err(StoreError::NotFound(item.external_id.clone())),
        }
    }

    fn set_manual_rating(&self, external_id: &str, rating: Option<&str>) -> Result<(), StoreError> {
        let conn = self.conn()?;
        for t in ItemType::ALL {
            let sql = format!(
                "UPDATE {} SET rating_manual = ?1 WHERE external_id = ?2",
                table(t)
            );
            if conn.execute(&sql, params![rating, external_id])? == 1 {
                return Ok(());
            }
        }
        Err(StoreError::NotFound(external_id.to_string()))
    }

    fn status_counts(&self) -> Result<Vec<StatusCount>, StoreError> {
        let conn = self.conn()?;
        let mut counts = Vec::new();

        for t in ItemType::ALL {
            let sql = format!(
                "SELECT status, COUNT(*) FROM {} GROUP BY status ORDER BY status",
                table(t)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;

            for (status, count) in rows {
                let status = status.parse().map_err(|e: anyhow::Error| StoreError::Corrupt {
                    id: format!("<{} status count>", t),
                    reason: e.to_string(),
                })?;
                counts.push(StatusCount {
                    item_type: t,
                    status,
                    count: count.max(0) as usize,
                });
            }
        }

        counts.sort_by_key(|c| (c.item_type, c.status));
        Ok(counts)
    }
}

fn table(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Episode => "episodes",
        ItemType::Newsletter => "newsletters",
    }
}

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Row as stored, before parsing
struct RawItem {
    external_id: String,
    title: String,
    author: Option<String>,
    published_at: Option<String>,
    discovered_at: String,
    source_link: Option<String>,
    status: String,
    attempt_count: i64,
    error_reason: Option<String>,
    content_hash: Option<String>,
    summary_payload: Option<String>,
    rating_manual: Option<String>,
    exported_at: Option<String>,
    export_mark: Option<String>,
    tags: String,
    artifact_path: Option<String>,
    last_attempt_at: Option<String>,
    updated_at: String,
}

impl RawItem {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            external_id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            published_at: row.get(3)?,
            discovered_at: row.get(4)?,
            source_link: row.get(5)?,
            status: row.get(6)?,
            attempt_count: row.get(7)?,
            error_reason: row.get(8)?,
            content_hash: row.get(9)?,
            summary_payload: row.get(10)?,
            rating_manual: row.get(11)?,
            exported_at: row.get(12)?,
            export_mark: row.get(13)?,
            tags: row.get(14)?,
            artifact_path: row.get(15)?,
            last_attempt_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }

    fn into_item(self, item_type: ItemType) -> Result<MediaItem, StoreError> {
        let id = self.external_id.clone();
        let corrupt = |reason: String| StoreError::Corrupt {
            id: id.clone(),
            reason,
        };
        let parse_ts = |value: &str| {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| corrupt(format!("bad timestamp '{}': {}", value, e)))
        };
        let parse_opt_ts = |value: Option<String>| value.as_deref().map(parse_ts).transpose();

        let status: ItemStatus = self.status.parse().map_err(|e| corrupt(format!("{}", e)))?;
        let attempt_count = u32::try_from(self.attempt_count)
            .map_err(|_| corrupt(format!("bad attempt_count {}", self.attempt_count)))?;
        let export_mark: Option<ExportMark> = self
            .export_mark
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e| corrupt(format!("{}", e)))?;
        let summary_payload: Option<SummaryPayload> = self
            .summary_payload
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let tags: Tags = serde_json::from_str(&self.tags)?;

        Ok(MediaItem {
            external_id: self.external_id,
            item_type,
            title: self.title,
            author: self.author,
            published_at: parse_opt_ts(self.published_at)?,
            discovered_at: parse_ts(&self.discovered_at)?,
            source_link: self.source_link,
            status,
            attempt_count,
            error_reason: self.error_reason,
            content_hash: self.content_hash,
            summary_payload,
            rating_manual: self.rating_manual,
            exported_at: parse_opt_ts(self.exported_at)?,
            export_mark,
            tags,
            artifact_path: self.artifact_path,
            last_attempt_at: parse_opt_ts(self.last_attempt_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}
