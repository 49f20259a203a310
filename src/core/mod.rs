//! Core lifecycle engine.
//!
//! This module contains:
//! - state_machine: status transitions and their guards
//! - retry: retry ceilings and backoff
//! - lifecycle: transitions persisted through the store
//! - lock: per-stage exclusive locks
//! - env: injected clock and content hasher
//! - report: per-stage outcome counts
//! - orchestrator: the batch stages

pub mod env;
pub mod lifecycle;
pub mod lock;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod state_machine;

// Re-export commonly used types
pub use env::{Clock, ContentHasher, FixedClock, Sha256Hasher, SystemClock};
pub use lifecycle::{advance, advance_by_id, LifecycleError};
pub use lock::{LockError, Stage, StageLock};
pub use orchestrator::{ExportScope, Orchestrator, StageSettings, INTERRUPTED_REASON};
pub use report::StageReport;
pub use retry::{RetryDecision, RetryPolicy};
pub use state_machine::{apply, next_status, Event, ExportRecord, TransitionError, Trigger};
