//! Obsidian vaults and notes.
//!
//! Note parsing is pure: it takes the note's text and extracts frontmatter
//! properties, `#tags`, and `[[wikilinks]]`. Fenced code blocks are not
//! searched for tags or links.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::record::{DirectoryRecord, FileRecord, Summarize};

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)#([\p{L}\p{N}_][\p{L}\p{N}_/\-]*)").expect("valid regex"));
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid regex"));

/// A note inside a vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRecord {
    pub record: FileRecord,
    /// `/`-separated path relative to the vault root.
    pub vault_path: String,
    /// `#`-prefixed, nested tags keep their full path (`#area/work`).
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub properties: BTreeMap<String, String>,
}

impl NoteRecord {
    /// Build a note from a text record. Non-text records yield empty
    /// tags, links, and properties.
    pub fn from_record(record: FileRecord, vault_path: String) -> Self {
        let parsed = record.text().map(parse_note).unwrap_or_default();
        Self {
            record,
            vault_path,
            tags: parsed.tags,
            links: parsed.links,
            properties: parsed.properties,
        }
    }

    pub fn id(&self) -> &str {
        self.record.id()
    }
}

/// A vault directory with its notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultRecord {
    pub directory: DirectoryRecord,
    /// The `.obsidian` marker folder is present.
    pub has_marker: bool,
    pub last_seen: DateTime<Utc>,
    pub notes: Vec<NoteRecord>,
}

impl VaultRecord {
    pub fn id(&self) -> &str {
        self.directory.id()
    }

    /// Every distinct tag across all notes, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .notes
            .iter()
            .flat_map(|n| n.tags.iter().map(String::as_str))
            .collect();
        set.into_iter().collect()
    }
}

impl Summarize for VaultRecord {
    fn summary(&self) -> String {
        format!(
            "[vault] {} ({} notes, {} tags)",
            self.directory.path().full,
            self.notes.len(),
            self.tags().len()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedNote {
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub properties: BTreeMap<String, String>,
}

pub fn parse_note(text: &str) -> ParsedNote {
    let (properties, fm_tags, body) = split_frontmatter(text);

    let mut tags: BTreeSet<String> = fm_tags
        .iter()
        .filter_map(|t| crate::tags::normalize_tag(t))
        .collect();
    let mut links: BTreeSet<String> = BTreeSet::new();

    let mut in_fence = false;
    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        for cap in TAG_RE.captures_iter(line) {
            let tag = &cap[1];
            if tag.chars().all(|c| c.is_ascii_digit() || c == '/' || c == '-') {
                continue;
            }
            tags.insert(format!("#{}", tag.to_lowercase()));
        }
        for cap in LINK_RE.captures_iter(line) {
            if let Some(target) = link_target(&cap[1]) {
                links.insert(target);
            }
        }
    }

    ParsedNote {
        tags: tags.into_iter().collect(),
        links: links.into_iter().collect(),
        properties,
    }
}

/// `target#heading|alias` to `target`. Same-note heading links yield `None`.
fn link_target(inner: &str) -> Option<String> {
    let target = inner.split('|').next().unwrap_or("");
    let target = target.split('#').next().unwrap_or("").trim();
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

/// Split a leading `---` block into properties and return the body after it.
/// Frontmatter `tags` are returned separately, as a list.
fn split_frontmatter(text: &str) -> (BTreeMap<String, String>, Vec<String>, &str) {
    let mut properties = BTreeMap::new();
    let mut tags = Vec::new();

    let rest = match text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return (properties, tags, text),
    };

    let mut offset = 0;
    let mut closed = false;
    let mut current_list: Option<String> = None;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" {
            closed = true;
            break;
        }
        if let Some(item) = trimmed.trim_start().strip_prefix("- ") {
            if let Some(key) = &current_list {
                let item = unquote(item);
                if key == "tags" {
                    tags.push(item.to_string());
                }
                properties
                    .entry(key.clone())
                    .and_modify(|v: &mut String| {
                        if !v.is_empty() {
                            v.push_str(", ");
                        }
                        v.push_str(item);
                    })
                    .or_insert_with(|| item.to_string());
            }
            continue;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            let key = key.trim().to_string();
            let value = unquote(value.trim());
            if value.is_empty() {
                current_list = Some(key.clone());
            } else {
                current_list = None;
                if key == "tags" {
                    tags.extend(
                        value
                            .trim_start_matches('[')
                            .trim_end_matches(']')
                            .split(',')
                            .map(|t| unquote(t.trim()).to_string()),
                    );
                }
            }
            properties.insert(key, value.to_string());
        }
    }

    if !closed {
        return (BTreeMap::new(), Vec::new(), text);
    }
    (properties, tags, &rest[offset..])
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|x| x.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|x| x.strip_suffix('\'')))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::text_record;

    #[test]
    fn test_tags_and_links() {
        let note = "# Heading\n\nWorking on #Project/alpha with [[Design Doc|the doc]].\nSee [[Roadmap#Q3]] and [[#local]]. Issue #123 is not a tag.\n";
        let parsed = parse_note(note);
        assert_eq!(parsed.tags, vec!["#project/alpha"]);
        assert_eq!(parsed.links, vec!["Design Doc", "Roadmap"]);
        assert!(parsed.properties.is_empty());
    }

    #[test]
    fn test_frontmatter_properties_and_tags() {
        let note = "---\ntitle: \"Weekly review\"\ntags: [work, Deep Focus]\naliases:\n  - review\n  - weekly\n---\nBody with #inline\n";
        let parsed = parse_note(note);
        assert_eq!(parsed.properties["title"], "Weekly review");
        assert_eq!(parsed.properties["aliases"], "review, weekly");
        assert_eq!(parsed.tags, vec!["#deep-focus", "#inline", "#work"]);
    }

    #[test]
    fn test_yaml_list_tags() {
        let parsed = parse_note("---\ntags:\n  - one\n  - two\n---\n");
        assert_eq!(parsed.tags, vec!["#one", "#two"]);
    }

    #[test]
    fn test_unclosed_frontmatter_is_body() {
        let parsed = parse_note("---\ntitle: x\n#tag");
        assert!(parsed.properties.is_empty());
        assert_eq!(parsed.tags, vec!["#tag"]);
    }

    #[test]
    fn test_code_fences_are_skipped() {
        let parsed = parse_note("```\n#include <stdio.h>\n[[not-a-link]]\n```\n#real");
        assert_eq!(parsed.tags, vec!["#real"]);
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn test_note_from_record() {
        let note = NoteRecord::from_record(
            text_record("/vault/daily/today.md", "#log [[yesterday]]"),
            "daily/today.md".to_string(),
        );
        assert_eq!(note.tags, vec!["#log"]);
        assert_eq!(note.links, vec!["yesterday"]);
        assert_eq!(note.vault_path, "daily/today.md");
    }
}
