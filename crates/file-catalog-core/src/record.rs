//! The catalog's record model.
//!
//! A [`FileRecord`] is one classified file: shared metadata plus a
//! kind-specific [`FilePayload`]. Identity is derived once, at
//! construction, from the absolute path and the content hash:
//!
//! ```text
//! file id      = sha256(path ++ content_hash)
//! directory id = sha256("dir:" ++ path)
//! line hash    = sha256(line content)
//! ```
//!
//! Unchanged files therefore keep their ID across rescans, edited files get
//! a new one, and directories (repositories, vaults) keep a stable ID that
//! later scans merge into.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::path::PathDescriptor;
use crate::sha256_hex;
use crate::stat::StatSnapshot;
use crate::tags::normalize_tags;

/// Discriminant of [`FilePayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Generic,
    Text,
    Image,
    Video,
    Data,
    Audio,
    Database,
}

impl FileKind {
    pub const ALL: [FileKind; 7] = [
        FileKind::Generic,
        FileKind::Text,
        FileKind::Image,
        FileKind::Video,
        FileKind::Data,
        FileKind::Audio,
        FileKind::Database,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Generic => "generic",
            FileKind::Text => "text",
            FileKind::Image => "image",
            FileKind::Video => "video",
            FileKind::Data => "data",
            FileKind::Audio => "audio",
            FileKind::Database => "database",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown file kind: '{}'", s))
    }
}

/// One line of a text-bearing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecord {
    /// 1-indexed.
    pub line_number: u32,
    /// Line content without its terminator.
    pub content: String,
    pub hash: String,
    /// Content is empty or whitespace-only.
    pub is_empty: bool,
}

impl LineRecord {
    pub fn new(line_number: u32, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            line_number,
            hash: sha256_hex(&content),
            is_empty: content.trim().is_empty(),
            content,
        }
    }
}

/// Split text into line records. Blank lines are kept.
pub fn split_lines(content: &str) -> Vec<LineRecord> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| LineRecord::new(i as u32 + 1, line))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    pub content: String,
    pub lines: Vec<LineRecord>,
}

impl TextPayload {
    /// Build from decoded text. NUL bytes are stripped before splitting.
    pub fn from_content(raw: &str) -> Self {
        let content = raw.replace('\0', "");
        let lines = split_lines(&content);
        Self { content, lines }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Base64 of the original bytes.
    pub data: String,
    /// Base64 PNG, downscaled to fit the configured box.
    pub thumbnail: String,
    /// EXIF tag name to display value.
    pub metadata: BTreeMap<String, String>,
    /// Lowercase format tag, e.g. `png`.
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub nsfw: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoPayload {
    /// Seconds.
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codec: Option<String>,
}

impl VideoPayload {
    pub fn resolution(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioPayload {
    pub duration: Option<f64>,
    pub transcript: Option<String>,
    /// ID of the video record this audio was extracted from.
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabasePayload {
    /// DDL statements joined by `;\n`.
    pub schema: String,
    /// Sorted table names.
    pub tables: Vec<String>,
}

/// Kind-specific content of a [`FileRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FilePayload {
    Generic,
    Text(TextPayload),
    Image(ImagePayload),
    Video(VideoPayload),
    Data(DataPayload),
    Audio(AudioPayload),
    Database(DatabasePayload),
}

impl FilePayload {
    pub fn kind(&self) -> FileKind {
        match self {
            FilePayload::Generic => FileKind::Generic,
            FilePayload::Text(_) => FileKind::Text,
            FilePayload::Image(_) => FileKind::Image,
            FilePayload::Video(_) => FileKind::Video,
            FilePayload::Data(_) => FileKind::Data,
            FilePayload::Audio(_) => FileKind::Audio,
            FilePayload::Database(_) => FileKind::Database,
        }
    }
}

/// A classified file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    id: String,
    content_hash: String,
    path: PathDescriptor,
    stat: StatSnapshot,
    mime_type: String,
    payload: FilePayload,
    pub tags: Vec<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub frozen: bool,
}

impl FileRecord {
    pub fn new(
        path: PathDescriptor,
        content_hash: String,
        stat: StatSnapshot,
        mime_type: String,
        payload: FilePayload,
    ) -> Self {
        Self {
            id: file_id(&path.full, &content_hash),
            content_hash,
            path,
            stat,
            mime_type,
            payload,
            tags: Vec::new(),
            short_description: None,
            long_description: None,
            frozen: true,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut all = std::mem::take(&mut self.tags);
        all.extend(tags.into_iter().map(|t| t.as_ref().to_string()));
        self.tags = normalize_tags(all);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn path(&self) -> &PathDescriptor {
        &self.path
    }

    pub fn stat(&self) -> &StatSnapshot {
        &self.stat
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn payload(&self) -> &FilePayload {
        &self.payload
    }

    pub fn kind(&self) -> FileKind {
        self.payload.kind()
    }

    /// Line records for text-bearing payloads.
    pub fn lines(&self) -> Option<&[LineRecord]> {
        match &self.payload {
            FilePayload::Text(t) => Some(&t.lines),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            FilePayload::Text(t) => Some(&t.content),
            FilePayload::Data(d) => Some(&d.content),
            _ => None,
        }
    }
}

/// A directory. Also the base of repository and vault records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    id: String,
    path: PathDescriptor,
    stat: StatSnapshot,
    pub file_count: u64,
    pub dir_count: u64,
    pub tags: Vec<String>,
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub frozen: bool,
}

impl DirectoryRecord {
    pub fn new(path: PathDescriptor, stat: StatSnapshot, file_count: u64, dir_count: u64) -> Self {
        Self {
            id: directory_id(&path.full),
            path,
            stat,
            file_count,
            dir_count,
            tags: Vec::new(),
            short_description: None,
            long_description: None,
            frozen: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &PathDescriptor {
        &self.path
    }

    pub fn stat(&self) -> &StatSnapshot {
        &self.stat
    }

    /// No direct children.
    pub fn is_empty(&self) -> bool {
        self.file_count == 0 && self.dir_count == 0
    }
}

pub fn file_id(path: &str, content_hash: &str) -> String {
    sha256_hex(format!("{}{}", path, content_hash))
}

pub fn directory_id(path: &str) -> String {
    sha256_hex(format!("dir:{}", path))
}

/// One-line human description of a record.
pub trait Summarize {
    fn summary(&self) -> String;
}

impl Summarize for FileRecord {
    fn summary(&self) -> String {
        let detail = match &self.payload {
            FilePayload::Text(t) => format!("{} lines", t.lines.len()),
            FilePayload::Image(i) => format!("{} {}x{}", i.format, i.width, i.height),
            FilePayload::Video(v) => match v.duration {
                Some(d) => format!("{:.1}s", d),
                None => "video".to_string(),
            },
            FilePayload::Audio(a) => match a.duration {
                Some(d) => format!("{:.1}s", d),
                None => "audio".to_string(),
            },
            FilePayload::Data(d) => format!("{} bytes", d.content.len()),
            FilePayload::Database(db) => format!("{} tables", db.tables.len()),
            FilePayload::Generic => self.mime_type.clone(),
        };
        format!("[{}] {} ({})", self.kind(), self.path.full, detail)
    }
}

impl Summarize for DirectoryRecord {
    fn summary(&self) -> String {
        format!(
            "[dir] {} ({} files, {} dirs)",
            self.path.full, self.file_count, self.dir_count
        )
    }
}

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures {
    use super::*;
    use crate::stat::PlatformStat;
    use std::path::Path;

    pub fn stat(size: u64) -> StatSnapshot {
        StatSnapshot {
            size,
            mode: 0o100644,
            readonly: false,
            accessed: None,
            modified: None,
            changed: None,
            created: None,
            platform: PlatformStat::Other,
        }
    }

    pub fn text_record(path: &str, content: &str) -> FileRecord {
        FileRecord::new(
            PathDescriptor::from_path(Path::new(path)),
            sha256_hex(content),
            stat(content.len() as u64),
            "text/plain".to_string(),
            FilePayload::Text(TextPayload::from_content(content)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_blank_lines_are_kept() {
        let payload = TextPayload::from_content("# Title\n\nBody");
        assert_eq!(payload.lines.len(), 3);
        assert_eq!(payload.lines[0].line_number, 1);
        assert_eq!(payload.lines[1].content, "");
        assert!(payload.lines[1].is_empty);
        assert!(!payload.lines[2].is_empty);
        assert_eq!(payload.lines[2].hash, sha256_hex("Body"));
    }

    #[test]
    fn test_nul_bytes_stripped() {
        let payload = TextPayload::from_content("a\0b\n");
        assert_eq!(payload.content, "ab\n");
        assert_eq!(payload.lines.len(), 1);
    }

    #[test]
    fn test_identity_follows_path_and_content() {
        let a = text_record("/tmp/a.md", "hello");
        let same = text_record("/tmp/a.md", "hello");
        let edited = text_record("/tmp/a.md", "hello!");
        let moved = text_record("/tmp/b.md", "hello");
        assert_eq!(a.id(), same.id());
        assert_ne!(a.id(), edited.id());
        assert_ne!(a.id(), moved.id());
        assert_eq!(a.id(), sha256_hex(format!("/tmp/a.md{}", sha256_hex("hello"))));
    }

    #[test]
    fn test_with_tags_normalizes() {
        let rec = text_record("/tmp/a.md", "x").with_tags(["Rust Lang", "#rust-lang", "todo"]);
        assert_eq!(rec.tags, vec!["#rust-lang", "#todo"]);
        assert!(rec.frozen);
    }

    #[test]
    fn test_directory_identity_is_path_only() {
        let p = PathDescriptor::from_path(std::path::Path::new("/srv/repo"));
        let a = DirectoryRecord::new(p.clone(), stat(0), 0, 0);
        let b = DirectoryRecord::new(p, stat(4096), 3, 1);
        assert_eq!(a.id(), b.id());
        assert!(a.is_empty());
        assert!(!b.is_empty());
    }

    #[test]
    fn test_payload_serializes_with_kind_tag() {
        let rec = text_record("/tmp/a.md", "x");
        let json = serde_json::to_value(rec.payload()).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!("database".parse::<FileKind>().unwrap(), FileKind::Database);
        assert!("pdf".parse::<FileKind>().is_err());
    }
}
