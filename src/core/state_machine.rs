//! Status state machine for media items.
//!
//! The transition table is a pure function of `(status, trigger)`. Guards that
//! depend on item data are checked by [`apply`], which also performs the
//! field updates that belong to each transition. Both are deterministic: a
//! given state, trigger and guard outcome yields exactly one result.
//!
//! ```text
//! pending ─claim─▶ in_progress ─succeed─▶ completed ─summarize─▶ summarized ─export─▶ exported
//!                       │                     │
//!                       └──fail──▶ failed ◀──fail
//!                                    │
//!               pending ◀─auto/manual retry
//!
//! any non-terminal ─skip─▶ skipped
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{ExportMark, ItemStatus, MediaItem, SummaryPayload, Tags};

/// What happened to an item, without its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A stage claimed the item for processing
    Claim,

    /// The processing stage produced its artifact
    Succeed,

    /// A stage raised an error
    Fail,

    /// The summarizer returned a payload
    Summarize,

    /// The exporter wrote or verified the note
    Export,

    /// Automatic requeue below the retry ceiling
    AutoRetry,

    /// Explicit retry command
    ManualRetry,

    /// Explicit skip command
    Skip,
}

/// Errors raised when a transition is not permitted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid state transition: {from} --{trigger:?}--> (no such edge)")]
    InvalidTransition { from: ItemStatus, trigger: Trigger },

    #[error("Guard failed for {trigger:?} from {from}: {reason}")]
    GuardFailed {
        from: ItemStatus,
        trigger: Trigger,
        reason: String,
    },
}

/// Resolve the target status for a trigger, ignoring data guards
pub fn next_status(from: ItemStatus, trigger: Trigger) -> Result<ItemStatus, TransitionError> {
    use ItemStatus::*;

    let to = match (from, trigger) {
        (Pending, Trigger::Claim) => InProgress,
        (InProgress, Trigger::Succeed) => Completed,
        (InProgress, Trigger::Fail) | (Completed, Trigger::Fail) => Failed,
        (Completed, Trigger::Summarize) => Summarized,
        // Re-exporting an exported item refreshes bookkeeping only
        (Summarized, Trigger::Export) | (Exported, Trigger::Export) => Exported,
        (Failed, Trigger::AutoRetry) | (Failed, Trigger::ManualRetry) => Pending,
        (from, Trigger::Skip) if !from.is_terminal() => Skipped,
        (from, trigger) => return Err(TransitionError::InvalidTransition { from, trigger }),
    };

    Ok(to)
}

/// Export bookkeeping recorded by a write or a verified skip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    pub mark: ExportMark,

    /// New content hash; `None` keeps the stored one (verified skips)
    pub content_hash: Option<String>,
}

/// A trigger together with the data its transition records
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Claimed,

    Succeeded { artifact: String },

    Failed { reason: String },

    Summarized { payload: SummaryPayload, tags: Tags },

    /// `record: None` promotes an unchanged note without touching bookkeeping
    Exported { record: Option<ExportRecord> },

    AutoRetried,

    ManuallyRetried,

    Skipped,
}

impl Event {
    pub fn trigger(&self) -> Trigger {
        match self {
            Event::Claimed => Trigger::Claim,
            Event::Succeeded { .. } => Trigger::Succeed,
            Event::Failed { .. } => Trigger::Fail,
            Event::Summarized { .. } => Trigger::Summarize,
            Event::Exported { .. } => Trigger::Export,
            Event::AutoRetried => Trigger::AutoRetry,
            Event::ManuallyRetried => Trigger::ManualRetry,
            Event::Skipped => Trigger::Skip,
        }
    }
}

/// Apply an event to an item in memory.
///
/// `ceiling` is the retry ceiling for the item's type. On error the item is
/// left untouched. Returns the new status.
pub fn apply(
    item: &mut MediaItem,
    event: Event,
    ceiling: u32,
    now: DateTime<Utc>,
) -> Result<ItemStatus, TransitionError> {
    let from = item.status;
    let trigger = event.trigger();
    let to = next_status(from, trigger)?;

    let guard_failed = |reason: &str| TransitionError::GuardFailed {
        from,
        trigger,
        reason: reason.to_string(),
    };

    match event {
        Event::Claimed => {
            item.last_attempt_at = Some(now);
        }
        Event::Succeeded { artifact } => {
            if artifact.trim().is_empty() {
                return Err(guard_failed("output artifact was not persisted"));
            }
            item.artifact_path = Some(artifact);
            // A stage that succeeds starts the next one with a fresh budget
            item.attempt_count = 0;
            item.error_reason = None;
        }
        Event::Failed { reason } => {
            if reason.trim().is_empty() {
                return Err(guard_failed("failure reason is empty"));
            }
            item.attempt_count = item.attempt_count.saturating_add(1);
            item.error_reason = Some(reason);
            item.last_attempt_at = Some(now);
        }
        Event::Summarized { payload, tags } => {
            payload.validate().map_err(|e| guard_failed(&e))?;
            item.summary_payload = Some(payload);
            item.tags = tags;
            item.attempt_count = 0;
            item.error_reason = None;
        }
        Event::Exported { record } => match record {
            Some(record) => {
                item.exported_at = Some(now);
                item.export_mark = Some(record.mark);
                if let Some(hash) = record.content_hash {
                    item.content_hash = Some(hash);
                }
            }
            None => {
                if item.exported_at.is_none() {
                    return Err(guard_failed("exported_at was never set"));
                }
            }
        },
        Event::AutoRetried => {
            if item.attempt_count >= ceiling {
                return Err(guard_failed(&format!(
                    "attempt_count {} reached ceiling {}",
                    item.attempt_count, ceiling
                )));
            }
            item.error_reason = None;
        }
        Event::ManuallyRetried => {
            item.attempt_count = 0;
            item.error_reason = None;
        }
        Event::Skipped => {}
    }

    item.status = to;
    item.updated_at = now;
    Ok(to)
}
