//! Markdown export into the vault.
//!
//! - paths: deterministic note and digest locations
//! - frontmatter: manual-edit detection
//! - note: note rendering
//! - exporter: write / skip-unchanged / skip-preserve decision

pub mod exporter;
pub mod frontmatter;
pub mod note;
pub mod paths;

pub use exporter::{write_atomic, ExportError, ExportOutcome, Exporter};
pub use frontmatter::{manual_rating, Frontmatter};
