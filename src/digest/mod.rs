//! Daily and weekly digests.
//!
//! - window: calendar windows and the week-end convention
//! - highlights: themes, actionables and takeaways per item
//! - aggregate: selection, ordering, failures
//! - render: Markdown output

pub mod aggregate;
pub mod highlights;
pub mod render;
pub mod window;

pub use aggregate::{aggregate, Digest, DigestEntry, DigestSettings, FailureEntry};
pub use highlights::{HighlightMap, HighlightSource, ItemHighlights};
pub use render::render_digest;
pub use window::{week_ending_on_or_before, DigestKind, DigestWindow};
