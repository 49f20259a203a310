//! Idempotent note exporter.
//!
//! Decides between writing a note, leaving an unchanged note alone, and
//! preserving a note the user has edited. The exporter only touches the
//! filesystem; recording the outcome on the item is the caller's job.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use super::frontmatter::manual_rating;
use super::note::render_note;
use super::paths::{note_relative_path, read_relative_path};
use crate::core::env::ContentHasher;
use crate::domain::MediaItem;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Item {0} has no summary to export")]
    MissingSummary(String),

    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExportError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        ExportError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What the exporter did for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Fresh content was written
    Written { path: PathBuf, content_hash: String },

    /// Rendered content matched what is already on disk
    SkippedUnchanged { path: PathBuf },

    /// The note carries a manual edit and was not touched
    SkippedPreserved { path: PathBuf },
}

impl ExportOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ExportOutcome::Written { path, .. }
            | ExportOutcome::SkippedUnchanged { path }
            | ExportOutcome::SkippedPreserved { path } => path,
        }
    }
}

/// Writes notes under an export root inside the vault
pub struct Exporter {
    root: PathBuf,
    hasher: Arc<dyn ContentHasher>,
}

impl Exporter {
    pub fn new(root: impl Into<PathBuf>, hasher: Arc<dyn ContentHasher>) -> Self {
        Self {
            root: root.into(),
            hasher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Existing artifact location: the unread note, or the read copy the
    /// user filed away. Defaults to the unread path when neither exists.
    pub fn locate(&self, item: &MediaItem) -> PathBuf {
        let unread = self.root.join(note_relative_path(item));
        if unread.exists() {
            return unread;
        }
        let read = self.root.join(read_relative_path(item));
        if read.exists() {
            return read;
        }
        unread
    }

    /// Render `item` into the content the exporter would write
    pub fn render(&self, item: &MediaItem) -> Result<String, ExportError> {
        let payload = item
            .summary_payload
            .as_ref()
            .ok_or_else(|| ExportError::MissingSummary(item.external_id.clone()))?;
        Ok(render_note(item, payload))
    }

    /// Decide without writing anything
    pub fn plan(&self, item: &MediaItem) -> Result<(ExportOutcome, String), ExportError> {
        let content = self.render(item)?;
        let path = self.locate(item);

        if has_text(item.rating_manual.as_deref()) {
            return Ok((ExportOutcome::SkippedPreserved { path }, content));
        }

        let existing = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(ExportError::io("read", &path, e)),
        };

        if let Some(bytes) = &existing {
            if manual_rating(&String::from_utf8_lossy(bytes)).is_some() {
                return Ok((ExportOutcome::SkippedPreserved { path }, content));
            }
        }

        let content_hash = self.hasher.hash(content.as_bytes());
        let on_disk_matches = existing
            .as_deref()
            .map(|bytes| self.hasher.hash(bytes) == content_hash)
            .unwrap_or(false);

        if on_disk_matches && item.content_hash.as_deref() == Some(content_hash.as_str()) {
            return Ok((ExportOutcome::SkippedUnchanged { path }, content));
        }

        Ok((ExportOutcome::Written { path, content_hash }, content))
    }

    /// Export one item, writing the note when needed
    pub fn export_item(&self, item: &MediaItem) -> Result<ExportOutcome, ExportError> {
        let (outcome, content) = self.plan(item)?;

        match &outcome {
            ExportOutcome::Written { path, .. } => {
                write_atomic(path, content.as_bytes())?;
                info!(id = %item.external_id, path = %path.display(), "Wrote note");
            }
            ExportOutcome::SkippedUnchanged { path } => {
                debug!(id = %item.external_id, path = %path.display(), "Note unchanged, skipping");
            }
            ExportOutcome::SkippedPreserved { path } => {
                info!(id = %item.external_id, path = %path.display(), "Note has manual edit, preserving");
            }
        }

        Ok(outcome)
    }
}

/// Write via a temp file in the target directory, then rename over the target
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| ExportError::io("create directory", dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ExportError::io("create temp file in", dir, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ExportError::io("write", tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| ExportError::io("replace", path, e.error))?;
    Ok(())
}

fn has_text(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}
