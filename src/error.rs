//! Error types for the catalog library.

use std::path::{Path, PathBuf};
use thiserror::Error;

use file_catalog_core::record::FileKind;

/// Catalog operation result type.
pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Path missing, not the expected type, or registry entry absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Registry entry or managed target directory already present.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The file's extension is not in the requested kind's table.
    #[error("Unsupported type: {path} is not a {kind} file")]
    UnsupportedType { path: PathBuf, kind: FileKind },

    /// Clone or copy into managed storage failed.
    #[error("Failed to clone {url}: {source}")]
    Cloning {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// A storage write failed. Carries the failing item.
    #[error("Failed to persist {item}: {source}")]
    Persistence {
        item: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Timed out after {secs}s: {what}")]
    TimedOut { what: String, secs: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn not_found(path: &Path) -> Self {
        Self::NotFound(path.display().to_string())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists(what.into())
    }

    pub fn persistence(item: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Persistence {
            item: item.into(),
            source,
        }
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }
}
