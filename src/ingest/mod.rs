//! Intake of newly discovered items.
//!
//! ```text
//! Discoverer → admit() → ItemStore::upsert_discovered → pending
//! ```

pub mod discovery;

pub use discovery::{admit, Admission};
