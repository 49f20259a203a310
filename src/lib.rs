//! media-digest - batch lifecycle engine for podcast and newsletter digests
//!
//! Turns discovered podcast episodes and email newsletters into summarized
//! Markdown notes in an Obsidian vault, plus daily and weekly digest notes.
//!
//! # Architecture
//!
//! Every item moves through a single state machine:
//! - `pending -> in_progress -> completed -> summarized -> exported`
//! - failures park in `failed` until retried, `skipped` is terminal
//! - every status change is a conditional store update, so two runs never
//!   both commit the same item
//!
//! Stages run as separate short-lived invocations, each guarded by a
//! non-blocking lock file.
//!
//! # Modules
//!
//! - `domain`: Data structures (MediaItem, ItemStatus, SummaryPayload, Tags)
//! - `core`: State machine, retry policy, stage locks, orchestration
//! - `store`: Item persistence (SQLite, in-memory)
//! - `ingest`: Admission of discovered items
//! - `export`: Note rendering and idempotent vault writes
//! - `digest`: Daily/weekly aggregation and rendering
//! - `adapters`: Collaborator traits and the external-command adapter
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! media-digest discover
//! media-digest process --type episode
//! media-digest summarize
//! media-digest export
//! media-digest build-daily --date today
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod digest;
pub mod domain;
pub mod export;
pub mod ingest;
pub mod store;

// Re-export main types at crate root for convenience
pub use core::{Orchestrator, StageReport};
pub use domain::{ItemStatus, ItemType, MediaItem, SummaryPayload};
pub use store::{ItemStore, MemoryStore, SqliteStore};
