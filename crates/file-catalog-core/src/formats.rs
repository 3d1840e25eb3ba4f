//! Closed file-format tables, default ignore lists, and scan modes.
//!
//! All extension tables hold lowercase extensions with their leading dot.
//! Lookups go through [`kind_for_extension`], which checks the tables in a
//! fixed order so an extension listed twice resolves deterministically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::record::FileKind;

pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpeg", ".jpg", ".bmp", ".svg", ".gif", ".webp", ".tiff", ".heic", ".nef",
];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".mpg", ".m4v",
];

pub const AUDIO_EXTENSIONS: &[&str] = &[
    ".mp3", ".wav", ".flac", ".ogg", ".m4a", ".aac", ".wma", ".opus",
];

pub const DATABASE_EXTENSIONS: &[&str] = &[".sqlite", ".sqlite3", ".db", ".db3"];

pub const DATA_EXTENSIONS: &[&str] = &[
    ".csv", ".json", ".xml", ".yaml", ".xlsx", ".parquet", ".avro", ".orc",
];

/// Source, markup and config formats read as text, with the syntax name
/// used for fenced code blocks.
pub const TEXT_EXTENSIONS: &[(&str, &str)] = &[
    (".md", "markdown"),
    (".markdown", "markdown"),
    (".txt", "text"),
    (".rst", "rst"),
    (".adoc", "asciidoc"),
    (".org", "org"),
    (".tex", "tex"),
    (".rs", "rust"),
    (".py", "python"),
    (".pyw", "python"),
    (".js", "js"),
    (".mjs", "js"),
    (".ts", "typescript"),
    (".tsx", "tsx"),
    (".jsx", "jsx"),
    (".go", "go"),
    (".java", "java"),
    (".kt", "kotlin"),
    (".scala", "scala"),
    (".c", "c"),
    (".h", "c"),
    (".cpp", "cpp"),
    (".cc", "cpp"),
    (".hpp", "cpp"),
    (".cs", "csharp"),
    (".rb", "rb"),
    (".php", "php"),
    (".pl", "perl"),
    (".lua", "lua"),
    (".hs", "haskell"),
    (".ml", "ocaml"),
    (".erl", "erlang"),
    (".clj", "clojure"),
    (".swift", "swift"),
    (".sh", "bash"),
    (".bash", "bash"),
    (".zsh", "bash"),
    (".ps1", "powershell"),
    (".bat", "bat"),
    (".cmd", "bat"),
    (".sql", "sql"),
    (".html", "html"),
    (".htm", "html"),
    (".css", "css"),
    (".scss", "scss"),
    (".sass", "sass"),
    (".yml", "yaml"),
    (".toml", "toml"),
    (".ini", "ini"),
    (".cfg", "ini"),
    (".properties", "properties"),
    (".proto", "protobuf"),
    (".diff", "diff"),
    (".patch", "diff"),
    (".vim", "vim"),
    (".gitignore", "gitignore"),
];

/// Directory or file names never descended into or cataloged. Entries may
/// be glob patterns matched against a single path component.
pub const IGNORE_PARTS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "__pycache__",
    ".idea",
    ".vscode",
    ".tox",
    ".pytest_cache",
    ".mypy_cache*",
    ".ipynb_checkpoints",
    ".eggs",
    "*.egg-info",
    ".venv",
    "venv",
    "env",
    ".virtualenvs",
    "site-packages",
    "pip-wheel-metadata",
    "bower_components",
    "target",
    "dist",
    "build",
    "logs",
    "tmp",
    "temp",
    "cache",
    ".cache",
    "bin",
    "obj",
    "out",
    ".gradle",
    ".m2",
    ".cargo",
    ".pyenv",
    ".pypoetry",
    ".nuget",
    ".dotnet",
    ".docker",
    ".aws",
    ".azure",
    ".ssh",
    ".gnupg",
    ".pki",
    ".local",
    ".vagrant",
    ".devcontainer",
    ".ollama",
    "AppData",
    "uv.lock",
    ".python-version",
];

/// File-name endings never cataloged. Compared case-insensitively, so
/// multi-part endings such as `.tar.gz` and full names such as `Thumbs.db`
/// work too.
pub const IGNORE_EXTENSIONS: &[&str] = &[
    ".pyc", ".pyo", ".pyd", ".log", ".ds_store", ".lock", ".dll", ".exe", ".lnk", "thumbs.db",
    ".tmp", ".bak", ".swp", ".egg", ".pkl", ".pickle", ".so", ".dylib", ".o", ".a", ".lib",
    ".obj", ".class", ".jar", ".war", ".ear", ".zip", ".tar", ".tar.gz", ".tgz", ".gz", ".bz2",
    ".xz", ".7z", ".rar", ".iso",
];

/// Extensions treated as documentation inside a repository.
pub const DOC_EXTENSIONS: &[&str] = &[".md", ".rst", ".txt"];

/// Folder whose presence marks a directory as an Obsidian vault.
pub const VAULT_MARKER: &str = ".obsidian";

/// Resolve the file kind for a lowercase extension from the closed tables.
///
/// Order: image, video, audio, database, data, text. `None` means the
/// extension is unknown and the caller should sniff content.
pub fn kind_for_extension(ext: &str) -> Option<FileKind> {
    if IMAGE_EXTENSIONS.contains(&ext) {
        Some(FileKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        Some(FileKind::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        Some(FileKind::Audio)
    } else if DATABASE_EXTENSIONS.contains(&ext) {
        Some(FileKind::Database)
    } else if DATA_EXTENSIONS.contains(&ext) {
        Some(FileKind::Data)
    } else if language_for_extension(ext).is_some() {
        Some(FileKind::Text)
    } else {
        None
    }
}

/// Whether `ext` belongs to `kind`'s table. Generic accepts everything.
pub fn extension_matches(kind: FileKind, ext: &str) -> bool {
    match kind {
        FileKind::Generic => true,
        FileKind::Image => IMAGE_EXTENSIONS.contains(&ext),
        FileKind::Video => VIDEO_EXTENSIONS.contains(&ext),
        FileKind::Audio => AUDIO_EXTENSIONS.contains(&ext),
        FileKind::Database => DATABASE_EXTENSIONS.contains(&ext),
        FileKind::Data => DATA_EXTENSIONS.contains(&ext),
        FileKind::Text => language_for_extension(ext).is_some(),
    }
}

pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    TEXT_EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

/// Whether a file name ends with one of `extensions` (case-insensitive).
pub fn has_ignored_extension(file_name: &str, extensions: &[String]) -> bool {
    let lower = file_name.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
}

/// Default ignore-extension list, lowercased, with `extra` appended.
pub fn ignore_extensions_with(extra: &[String]) -> Vec<String> {
    IGNORE_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .chain(extra.iter().map(|e| e.to_lowercase()))
        .collect()
}

/// What a scan is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    GitLocal,
    GitCloned,
    Image,
    Video,
    Database,
    ObsidianVault,
    Docs,
    Pdf,
    All,
}

impl ScanMode {
    pub const ALL: [ScanMode; 9] = [
        ScanMode::GitLocal,
        ScanMode::GitCloned,
        ScanMode::Image,
        ScanMode::Video,
        ScanMode::Database,
        ScanMode::ObsidianVault,
        ScanMode::Docs,
        ScanMode::Pdf,
        ScanMode::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::GitLocal => "git-local",
            ScanMode::GitCloned => "git-cloned",
            ScanMode::Image => "image",
            ScanMode::Video => "video",
            ScanMode::Database => "database",
            ScanMode::ObsidianVault => "obsidian-vault",
            ScanMode::Docs => "docs",
            ScanMode::Pdf => "pdf",
            ScanMode::All => "all",
        }
    }

    /// Whether a file with lowercase extension `ext` is in scope.
    pub fn accepts(&self, ext: &str) -> bool {
        match self {
            ScanMode::Image => IMAGE_EXTENSIONS.contains(&ext),
            ScanMode::Video => VIDEO_EXTENSIONS.contains(&ext),
            ScanMode::Database => DATABASE_EXTENSIONS.contains(&ext),
            ScanMode::Docs => matches!(ext, ".md" | ".markdown" | ".rst" | ".txt" | ".adoc" | ".org"),
            ScanMode::Pdf => ext == ".pdf",
            ScanMode::ObsidianVault => ext == ".md",
            ScanMode::GitLocal | ScanMode::GitCloned | ScanMode::All => true,
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScanMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown scan mode: '{}'. Available: {}",
                    s,
                    ScanMode::ALL.map(|m| m.as_str()).join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_lookup_order() {
        assert_eq!(kind_for_extension(".png"), Some(FileKind::Image));
        assert_eq!(kind_for_extension(".mkv"), Some(FileKind::Video));
        assert_eq!(kind_for_extension(".flac"), Some(FileKind::Audio));
        assert_eq!(kind_for_extension(".sqlite3"), Some(FileKind::Database));
        assert_eq!(kind_for_extension(".json"), Some(FileKind::Data));
        assert_eq!(kind_for_extension(".rs"), Some(FileKind::Text));
        assert_eq!(kind_for_extension(".weird"), None);
    }

    #[test]
    fn test_extension_matches() {
        assert!(extension_matches(FileKind::Image, ".jpg"));
        assert!(!extension_matches(FileKind::Image, ".md"));
        assert!(extension_matches(FileKind::Generic, ".anything"));
        assert_eq!(language_for_extension(".py"), Some("python"));
    }

    #[test]
    fn test_ignored_extensions_are_case_insensitive() {
        let list = ignore_extensions_with(&[".CUSTOM".to_string()]);
        assert!(has_ignored_extension("module.PYC", &list));
        assert!(has_ignored_extension("backup.tar.gz", &list));
        assert!(has_ignored_extension("Thumbs.db", &list));
        assert!(has_ignored_extension("x.custom", &list));
        assert!(!has_ignored_extension("notes.md", &list));
        assert!(!has_ignored_extension("catalog.sqlite", &list));
    }

    #[test]
    fn test_scan_mode_parse_and_filter() {
        assert_eq!("obsidian-vault".parse::<ScanMode>().unwrap(), ScanMode::ObsidianVault);
        assert!("nope".parse::<ScanMode>().is_err());
        assert!(ScanMode::Docs.accepts(".md"));
        assert!(!ScanMode::Docs.accepts(".png"));
        assert!(ScanMode::All.accepts(".png"));
        assert_eq!(ScanMode::GitCloned.to_string(), "git-cloned");
    }
}
