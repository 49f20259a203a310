//! YAML front matter of exported notes.
//!
//! The user marks a note as hand-edited by filling in its `rating:` field.
//! Any non-empty value counts; `null`, `~` and `""` are empty.

use serde_yaml::{Mapping, Value};

/// Parsed front matter block
#[derive(Debug, Clone, PartialEq)]
pub struct Frontmatter {
    fields: Mapping,
}

impl Frontmatter {
    /// Parse the `---` delimited block at the top of a note.
    ///
    /// Returns `None` when the note has no block or it is not a YAML mapping.
    pub fn parse(content: &str) -> Option<Self> {
        let block = extract_block(content)?;
        match serde_yaml::from_str::<Value>(block).ok()? {
            Value::Mapping(fields) => Some(Self { fields }),
            Value::Null => Some(Self {
                fields: Mapping::new(),
            }),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find_map(|(k, v)| match k {
            Value::String(name) if name.eq_ignore_ascii_case(key) => Some(v),
            _ => None,
        })
    }

    /// The manual rating, if the user filled one in
    pub fn rating(&self) -> Option<String> {
        self.get("rating").and_then(scalar_text)
    }
}

/// Manual rating recorded in a note.
///
/// Falls back to scanning for the first `rating:` line when the front matter
/// does not parse, so a note the user broke while editing is still treated
/// as edited.
pub fn manual_rating(content: &str) -> Option<String> {
    match Frontmatter::parse(content) {
        Some(frontmatter) => frontmatter.rating(),
        None => scan_rating_line(content),
    }
}

fn extract_block(content: &str) -> Option<&str> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some(&rest[..offset]);
        }
        offset += line.len();
    }
    None
}

fn scan_rating_line(content: &str) -> Option<String> {
    let line = content
        .lines()
        .find(|line| line.to_lowercase().starts_with("rating:"))?;
    let value = line.split_once(':')?.1.trim();
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    if value.is_empty() || value == "~" || value.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(value.to_string())
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Lists or maps: keep the raw YAML so the edit is still detected
        other => serde_yaml::to_string(other).ok()?.trim().to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
