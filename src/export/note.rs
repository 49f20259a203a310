//! Markdown note rendering.
//!
//! Rendering is a pure function of the item: no clock reads, stable field
//! order, so identical items hash identically.

use std::fmt::Write;

use crate::domain::{MediaItem, Mention, SummaryPayload};

const NONE_NOTED: &str = "_None noted._";

/// Render the full note for a summarized item
pub fn render_note(item: &MediaItem, payload: &SummaryPayload) -> String {
    let mut out = String::new();
    render_frontmatter(&mut out, item, payload);

    let _ = writeln!(out);
    let _ = writeln!(out, "# {}", item.title.trim());
    let _ = writeln!(out);

    section(&mut out, "Summary");
    let _ = writeln!(out, "{}", payload.summary.trim());
    let _ = writeln!(out);

    section(&mut out, "Topics");
    bullets(&mut out, payload.key_topics.iter().map(|t| t.trim().to_string()));

    section(&mut out, "Companies");
    bullets(&mut out, payload.companies.iter().map(mention));

    section(&mut out, "Tools");
    bullets(&mut out, payload.tools.iter().map(mention));

    section(&mut out, "Quotes");
    let quotes: Vec<String> = payload
        .quotes
        .iter()
        .filter(|q| !q.text.trim().is_empty())
        .map(|q| match q.timestamp.as_deref().map(str::trim) {
            Some(ts) if !ts.is_empty() => format!("> {} ({})", q.text.trim(), ts),
            _ => format!("> {}", q.text.trim()),
        })
        .collect();
    if quotes.is_empty() {
        let _ = writeln!(out, "{}", NONE_NOTED);
    } else {
        let _ = writeln!(out, "{}", quotes.join("\n>\n"));
    }

    out
}

fn render_frontmatter(out: &mut String, item: &MediaItem, payload: &SummaryPayload) {
    let _ = writeln!(out, "---");
    let _ = writeln!(out, "title: {}", quoted(item.title.trim()));
    let _ = writeln!(out, "date: {}", item.publish_date().format("%Y-%m-%d"));
    if item.tags.is_empty() {
        let _ = writeln!(out, "tags: []");
    } else {
        let _ = writeln!(out, "tags:");
        for tag in item.tags.as_slice() {
            let _ = writeln!(out, "  - {}", quoted(tag));
        }
    }
    let _ = writeln!(out, "link: {}", quoted(item.source_link.as_deref().unwrap_or("")));
    let _ = writeln!(out, "rating:");
    let _ = writeln!(out, "rating_llm: {}", payload.rating_llm);
    let _ = writeln!(out, "type: {}", item.item_type.note_type());
    let _ = writeln!(out, "version: {}", quoted(&item.external_id));
    let _ = writeln!(out, "---");
}

/// YAML double-quoted scalar (JSON string syntax is valid YAML)
fn quoted(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "## {}", title);
    let _ = writeln!(out);
}

fn bullets(out: &mut String, items: impl Iterator<Item = String>) {
    let lines: Vec<String> = items.filter(|s| !s.is_empty()).collect();
    if lines.is_empty() {
        let _ = writeln!(out, "{}", NONE_NOTED);
    } else {
        for line in lines {
            let _ = writeln!(out, "- {}", line);
        }
    }
    let _ = writeln!(out);
}

fn mention(m: &Mention) -> String {
    let name = m.name.trim();
    let context = m.context.trim();
    match (name.is_empty(), context.is_empty()) {
        (true, _) => String::new(),
        (false, true) => format!("**{}**", name),
        (false, false) => format!("**{}**: {}", name, context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DiscoveredItem, ItemType};
    use crate::export::frontmatter::{manual_rating, Frontmatter};
    use chrono::{TimeZone, Utc};

    fn summarized() -> (MediaItem, SummaryPayload) {
        let mut item = MediaItem::discovered(
            DiscoveredItem {
                external_id: "ep-1".to_string(),
                item_type: ItemType::Episode,
                title: "Agents \"in\" Production".to_string(),
                author: Some("Latent Space".to_string()),
                published_at: Some(Utc.with_ymd_and_hms(2025, 10, 1, 5, 0, 0).unwrap()),
                source_link: Some("https://example.com/ep-1".to_string()),
            },
            Utc.with_ymd_and_hms(2025, 10, 2, 5, 0, 0).unwrap(),
        );
        item.tags = ["ai", "agents"].into_iter().collect();
        let payload: SummaryPayload = serde_json::from_str(
            r#"{
                "summary": "Agents are hard.",
                "key_topics": ["evals"],
                "companies": [{"name": "Acme", "context": "ships agents"}],
                "quotes": [{"text": "Ship it.", "timestamp": "12:34"}],
                "rating_llm": 4
            }"#,
        )
        .unwrap();
        (item, payload)
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let (item, payload) = summarized();
        assert_eq!(render_note(&item, &payload), render_note(&item, &payload));
    }

    #[test]
    fn test_frontmatter_fields_parse_back() {
        let (item, payload) = summarized();
        let note = render_note(&item, &payload);
        let fm = Frontmatter::parse(&note).unwrap();

        assert_eq!(fm.get("title").and_then(|v| v.as_str()), Some("Agents \"in\" Production"));
        assert_eq!(fm.get("type").and_then(|v| v.as_str()), Some("podcast"));
        assert_eq!(fm.get("rating_llm").and_then(|v| v.as_u64()), Some(4));
        assert_eq!(fm.get("version").and_then(|v| v.as_str()), Some("ep-1"));
        assert_eq!(manual_rating(&note), None);
    }

    #[test]
    fn test_sections_in_order_with_placeholders() {
        let (item, payload) = summarized();
        let note = render_note(&item, &payload);

        let order: Vec<usize> = ["## Summary", "## Topics", "## Companies", "## Tools", "## Quotes"]
            .iter()
            .map(|h| note.find(h).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(note.contains("- **Acme**: ships agents"));
        assert!(note.contains("> Ship it. (12:34)"));
        assert!(note.contains("## Tools\n\n_None noted._"));
    }
}
