//! Domain types for media-digest.
//!
//! This module contains the core data structures:
//! - MediaItem: the unit of work, tagged by ItemType
//! - ItemStatus: lifecycle states driven by the state machine
//! - SummaryPayload: opaque summarizer output
//! - Tags: capped, normalised tag set

pub mod item;
pub mod summary;
pub mod tags;

// Re-export commonly used types
pub use item::{DiscoveredItem, ExportMark, ItemStatus, ItemType, MediaItem};
pub use summary::{Mention, Quote, SummaryPayload, Theme};
pub use tags::{Tags, MAX_TAGS};
