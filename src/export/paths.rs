//! Deterministic vault layout.
//!
//! Note paths depend only on stable item attributes (date, author, title),
//! so re-running an export always targets the same file.

use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::{ItemType, MediaItem};

/// Longest sanitised file-name component, in characters
pub const MAX_COMPONENT_CHARS: usize = 180;

pub const UNREAD_DIR: &str = "unread";
pub const READ_DIR: &str = "read";
pub const DAILY_DIR: &str = "Daily summary";
pub const WEEKLY_DIR: &str = "Weekly summary";

/// Folder holding notes of one type
pub fn type_dir(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Episode => "Podcasts",
        ItemType::Newsletter => "Newsletters",
    }
}

fn unknown_author(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Episode => "Unknown podcast",
        ItemType::Newsletter => "Unknown sender",
    }
}

/// Replace characters illegal in file names, collapse whitespace, truncate
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '\\' | '/' | '\0' | '\t' | '\n' | '\r' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();

    replaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_COMPONENT_CHARS)
        .collect()
}

/// File-name component: sanitised, spaces as `_`, never empty
pub fn slugify(name: &str) -> String {
    let sanitized = sanitize_filename(name);
    if sanitized.is_empty() {
        "untitled".to_string()
    } else {
        sanitized.replace(' ', "_")
    }
}

/// `{date}_{author}_{title}.md`
pub fn note_file_name(item: &MediaItem) -> String {
    let author = item
        .author
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| unknown_author(item.item_type));

    format!(
        "{}_{}_{}.md",
        item.publish_date().format("%Y-%m-%d"),
        slugify(author),
        slugify(&item.title)
    )
}

/// Where the exporter writes a note, relative to the export root
pub fn note_relative_path(item: &MediaItem) -> PathBuf {
    Path::new(UNREAD_DIR)
        .join(type_dir(item.item_type))
        .join(note_file_name(item))
}

/// Where the note lives once the user has filed it as read
pub fn read_relative_path(item: &MediaItem) -> PathBuf {
    Path::new(READ_DIR)
        .join(type_dir(item.item_type))
        .join(note_file_name(item))
}

pub fn daily_digest_relative_path(date: NaiveDate) -> PathBuf {
    Path::new(UNREAD_DIR)
        .join(DAILY_DIR)
        .join(format!("{} daily.md", date.format("%Y-%m-%d")))
}

pub fn weekly_digest_relative_path(week_end: NaiveDate) -> PathBuf {
    Path::new(UNREAD_DIR)
        .join(WEEKLY_DIR)
        .join(format!("{} weekly.md", week_end.format("%Y-%m-%d")))
}

/// Relative link from a directory to a file, both relative to the same root.
///
/// Always uses `/` separators so links work in the vault on any platform.
pub fn relative_link(from_dir: &Path, to: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DiscoveredItem;
    use chrono::{TimeZone, Utc};

    fn episode(author: Option<&str>, title: &str) -> MediaItem {
        MediaItem::discovered(
            DiscoveredItem {
                external_id: "ep-1".to_string(),
                item_type: ItemType::Episode,
                title: title.to_string(),
                author: author.map(str::to_string),
                published_at: Some(Utc.with_ymd_and_hms(2025, 10, 1, 5, 0, 0).unwrap()),
                source_link: None,
            },
            Utc.with_ymd_and_hms(2025, 10, 2, 5, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize_filename("a/b:c*d?"), "a_b_c_d_");
        assert_eq!(sanitize_filename("  many   spaces\there "), "many spaces_here");
        assert_eq!(sanitize_filename(&"x".repeat(300)).chars().count(), MAX_COMPONENT_CHARS);
    }

    #[test]
    fn test_slugify_never_empty() {
        assert_eq!(slugify("Hard Fork"), "Hard_Fork");
        assert_eq!(slugify("   "), "untitled");
    }

    #[test]
    fn test_note_path_is_deterministic() {
        let item = episode(Some("Hard Fork"), "AI: What's Next?");
        assert_eq!(
            note_relative_path(&item),
            PathBuf::from("unread/Podcasts/2025-10-01_Hard_Fork_AI__What's_Next_.md")
        );
        assert_eq!(note_relative_path(&item), note_relative_path(&item.clone()));
    }

    #[test]
    fn test_missing_author_uses_placeholder() {
        let item = episode(None, "Title");
        assert_eq!(note_file_name(&item), "2025-10-01_Unknown_podcast_Title.md");
    }

    #[test]
    fn test_relative_link_from_digest_dir() {
        let digest = daily_digest_relative_path(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        let note = PathBuf::from("unread/Podcasts/2025-10-01_Show_Title.md");

        let link = relative_link(digest.parent().unwrap(), &note);
        assert_eq!(link, "../Podcasts/2025-10-01_Show_Title.md");
    }
}
