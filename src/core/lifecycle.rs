//! Persisted transitions.
//!
//! Glues the pure state machine to the store: apply the event to a copy of
//! the item, then save it conditionally on the status it was read in. A
//! concurrent or repeated transition surfaces as `StatusMismatch` and leaves
//! the stored row untouched.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use super::state_machine::{apply, Event, TransitionError};
use crate::domain::MediaItem;
use crate::store::{ItemStore, StoreError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl LifecycleError {
    /// Someone else moved the item first
    pub fn is_lost_race(&self) -> bool {
        matches!(self, LifecycleError::Store(StoreError::StatusMismatch { .. }))
    }
}

/// Apply `event` to `current` and persist it.
///
/// `current` must be the item as last read from the store. Returns the
/// updated item.
pub fn advance(
    store: &dyn ItemStore,
    current: &MediaItem,
    event: Event,
    ceiling: u32,
    now: DateTime<Utc>,
) -> Result<MediaItem, LifecycleError> {
    let expected = current.status;
    let trigger = event.trigger();

    let mut next = current.clone();
    let to = apply(&mut next, event, ceiling, now)?;
    store.save_if_status(&next, expected)?;

    debug!(
        id = %current.external_id,
        from = %expected,
        to = %to,
        ?trigger,
        "Transition committed"
    );
    Ok(next)
}

/// Load an item by id and advance it
pub fn advance_by_id(
    store: &dyn ItemStore,
    external_id: &str,
    event: Event,
    ceiling: impl Fn(&MediaItem) -> u32,
    now: DateTime<Utc>,
) -> Result<MediaItem, LifecycleError> {
    let current = store
        .get(external_id)?
        .ok_or_else(|| StoreError::NotFound(external_id.to_string()))?;
    let ceiling = ceiling(&current);
    advance(store, &current, event, ceiling, now)
}
