//! Digest Markdown rendering.
//!
//! The body contains no wall-clock values, so rebuilding a digest from the
//! same data yields byte-identical output.

use std::fmt::Write;

use super::aggregate::{Digest, DigestEntry};
use super::window::DigestKind;
use crate::domain::ItemType;

pub fn render_digest(digest: &Digest) -> String {
    let mut out = String::new();
    let window = &digest.window;

    let _ = writeln!(out, "---");
    match window.kind {
        DigestKind::Daily => {
            let _ = writeln!(out, "type: daily-digest");
            let _ = writeln!(out, "date: {}", window.last_day.format("%Y-%m-%d"));
        }
        DigestKind::Weekly => {
            let _ = writeln!(out, "type: weekly-digest");
            let _ = writeln!(out, "week_start: {}", window.first_day.format("%Y-%m-%d"));
            let _ = writeln!(out, "week_end: {}", window.last_day.format("%Y-%m-%d"));
        }
    }
    let _ = writeln!(out, "items: {}", digest.entries.len());
    let _ = writeln!(out, "failures: {}", digest.failures.len());
    let _ = writeln!(out, "---");
    let _ = writeln!(out);

    match window.kind {
        DigestKind::Daily => {
            let _ = writeln!(out, "# Daily digest {}", window.last_day.format("%Y-%m-%d"));
        }
        DigestKind::Weekly => {
            let _ = writeln!(
                out,
                "# Weekly digest {} to {}",
                window.first_day.format("%Y-%m-%d"),
                window.last_day.format("%Y-%m-%d")
            );
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Items");
    let _ = writeln!(out);
    if digest.entries.is_empty() {
        let _ = writeln!(out, "_No items in this period._");
        let _ = writeln!(out);
    }
    for entry in &digest.entries {
        render_entry(&mut out, entry, window.kind);
    }

    let _ = writeln!(out, "## Failures");
    let _ = writeln!(out);
    if digest.failures.is_empty() {
        let _ = writeln!(out, "_No failures._");
    }
    for failure in &digest.failures {
        // Reasons are verbatim; continuation lines stay inside the bullet
        let mut lines = failure.error_reason.lines();
        let _ = writeln!(
            out,
            "- **{}** ({}): {}",
            failure.title.trim(),
            kind_label(failure.item_type),
            lines.next().unwrap_or_default()
        );
        for line in lines {
            let _ = writeln!(out, "  {}", line);
        }
    }
    let _ = writeln!(out);

    if !digest.themes.is_empty() {
        let _ = writeln!(out, "## Themes");
        let _ = writeln!(out);
        for theme in &digest.themes {
            let _ = writeln!(out, "- **{}**: {}", theme.title, theme.summary);
        }
        let _ = writeln!(out);
    }

    match window.kind {
        DigestKind::Daily if !digest.actionables.is_empty() => {
            let _ = writeln!(out, "## Actionables");
            let _ = writeln!(out);
            for actionable in &digest.actionables {
                let _ = writeln!(out, "- [ ] {}", actionable);
            }
            let _ = writeln!(out);
        }
        DigestKind::Weekly if digest.entries.iter().any(|e| !e.takeaways.is_empty()) => {
            let _ = writeln!(out, "## Takeaways");
            let _ = writeln!(out);
            for entry in digest.entries.iter().filter(|e| !e.takeaways.is_empty()) {
                let _ = writeln!(out, "### {}", entry.title);
                let _ = writeln!(out);
                for takeaway in &entry.takeaways {
                    let _ = writeln!(out, "- {}", takeaway);
                }
                let _ = writeln!(out);
            }
        }
        _ => {}
    }

    // Single trailing newline
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    out
}

fn render_entry(out: &mut String, entry: &DigestEntry, kind: DigestKind) {
    let _ = writeln!(out, "### [{}]({})", entry.title, encode_link(&entry.note_link));

    let mut meta = vec![kind_label(entry.item_type).to_string()];
    if kind == DigestKind::Weekly {
        meta.push(entry.timestamp.format("%Y-%m-%d").to_string());
    }
    meta.push(format!("rating {}/5", entry.rating_llm));
    let _ = writeln!(out, "*{}*", meta.join(" · "));
    if let Some(link) = entry.source_link.as_deref().filter(|l| !l.is_empty()) {
        let _ = writeln!(out, "[Source]({})", link);
    }
    let _ = writeln!(out);

    if !entry.summary.is_empty() {
        let _ = writeln!(out, "{}", entry.summary);
        let _ = writeln!(out);
    }
}

fn kind_label(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Episode => "Podcast",
        ItemType::Newsletter => "Newsletter",
    }
}

/// Markdown link targets cannot contain raw spaces or parentheses
fn encode_link(link: &str) -> String {
    link.replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}
