//! Decomposed path values.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// A path broken into the pieces the catalog stores and queries on.
///
/// Always derived from a real [`Path`] via [`PathDescriptor::from_path`];
/// the fields are never edited independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDescriptor {
    /// The full path as given (the classifier passes absolute paths).
    pub full: String,
    pub name: String,
    pub stem: String,
    /// Last extension including the leading dot, or empty.
    pub suffix: String,
    /// Every extension, e.g. `[".tar", ".gz"]`.
    pub suffixes: Vec<String>,
    pub parent: String,
    /// Ancestors, nearest first.
    pub parents: Vec<String>,
    /// Drive/prefix plus root, e.g. `/` or `C:\`.
    pub anchor: String,
    pub parts: Vec<String>,
    pub is_absolute: bool,
}

impl PathDescriptor {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let parent = path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let parents = path
            .ancestors()
            .skip(1)
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_string_lossy().to_string())
            .collect();

        let mut anchor = String::new();
        for component in path.components() {
            match component {
                Component::Prefix(prefix) => {
                    anchor.push_str(&prefix.as_os_str().to_string_lossy())
                }
                Component::RootDir => anchor.push(std::path::MAIN_SEPARATOR),
                _ => break,
            }
        }

        let parts = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();

        Self {
            full: path.to_string_lossy().to_string(),
            suffix: suffixes_of(&name).pop().unwrap_or_default(),
            suffixes: suffixes_of(&name),
            name,
            stem,
            parent,
            parents,
            anchor,
            parts,
            is_absolute: path.is_absolute(),
        }
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.full)
    }

    /// Lowercased last extension, used for format-table lookups.
    pub fn extension(&self) -> String {
        self.suffix.to_lowercase()
    }
}

/// Extensions of a file name the way most shells read them: a leading dot
/// (`.bashrc`) is part of the name, not an extension.
fn suffixes_of(name: &str) -> Vec<String> {
    if name.ends_with('.') {
        return Vec::new();
    }
    let trimmed = name.trim_start_matches('.');
    trimmed
        .split('.')
        .skip(1)
        .filter(|s| !s.is_empty())
        .map(|s| format!(".{}", s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_of_nested_file() {
        let d = PathDescriptor::from_path(Path::new("/home/user/archive.tar.gz"));
        assert_eq!(d.name, "archive.tar.gz");
        assert_eq!(d.stem, "archive.tar");
        assert_eq!(d.suffix, ".gz");
        assert_eq!(d.suffixes, vec![".tar", ".gz"]);
        assert_eq!(d.parent, "/home/user");
        assert_eq!(d.parents, vec!["/home/user", "/home", "/"]);
        assert_eq!(d.anchor, "/");
        assert_eq!(d.parts, vec!["/", "home", "user", "archive.tar.gz"]);
        assert!(d.is_absolute);
        assert_eq!(d.to_path_buf(), PathBuf::from("/home/user/archive.tar.gz"));
    }

    #[test]
    fn test_dotfile_has_no_suffix() {
        let d = PathDescriptor::from_path(Path::new("notes/.bashrc"));
        assert_eq!(d.suffix, "");
        assert!(d.suffixes.is_empty());
        assert!(!d.is_absolute);
        assert_eq!(d.anchor, "");
    }

    #[test]
    fn test_extension_is_lowercased() {
        let d = PathDescriptor::from_path(Path::new("/tmp/PHOTO.JPG"));
        assert_eq!(d.suffix, ".JPG");
        assert_eq!(d.extension(), ".jpg");
    }
}
