//! Storage abstraction for File Catalog.
//!
//! The [`CatalogStore`] trait defines every storage operation the import
//! pipeline needs, so the same pipeline runs against SQLite in production
//! and [`memory::InMemoryStore`] in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Write semantics
//!
//! - File records are immutable: `insert_*` on an existing ID is an error,
//!   callers check with `find_*` first.
//! - Repositories and vaults are merged: `upsert_*` keeps `created_at` and
//!   replaces everything else.
//! - Text-bearing inserts also store one line row per non-blank line,
//!   replacing any previous rows for the same owner atomically.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::record::{FileRecord, LineRecord};
use crate::repo::{RepoFile, RepoRecord};
use crate::scan::ScanResult;
use crate::vault::{NoteRecord, VaultRecord};

/// Bookkeeping for a stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMeta {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Abstract storage backend for the catalog.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_file`](CatalogStore::find_file) | Look up a loose file by ID, any kind |
/// | [`insert_file`](CatalogStore::insert_file) | Store a new file record |
/// | [`get_file`](CatalogStore::get_file) | Load a stored file record |
/// | [`find_repo`](CatalogStore::find_repo) / [`upsert_repo`](CatalogStore::upsert_repo) | Repository rows |
/// | [`find_repo_file`](CatalogStore::find_repo_file) / [`insert_repo_file`](CatalogStore::insert_repo_file) | Files under a repository |
/// | [`find_vault`](CatalogStore::find_vault) / [`upsert_vault`](CatalogStore::upsert_vault) | Vault rows |
/// | [`find_note`](CatalogStore::find_note) / [`insert_note`](CatalogStore::insert_note) | Notes under a vault |
/// | [`upsert_scan_root`](CatalogStore::upsert_scan_root) | Record a scanned root |
/// | [`lines`](CatalogStore::lines) | Stored non-blank lines of a text item |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_file(&self, id: &str) -> Result<Option<StoredMeta>>;

    async fn insert_file(&self, record: &FileRecord) -> Result<()>;

    async fn get_file(&self, id: &str) -> Result<Option<FileRecord>>;

    async fn find_repo(&self, id: &str) -> Result<Option<StoredMeta>>;

    /// Insert, or merge into the existing row keeping `created_at`.
    async fn upsert_repo(&self, repo: &RepoRecord) -> Result<()>;

    async fn find_repo_file(&self, repo_id: &str, file_id: &str) -> Result<Option<StoredMeta>>;

    async fn insert_repo_file(&self, repo_id: &str, file: &RepoFile) -> Result<()>;

    async fn find_vault(&self, id: &str) -> Result<Option<StoredMeta>>;

    /// Insert, or merge into the existing row keeping `created_at`.
    async fn upsert_vault(&self, vault: &VaultRecord) -> Result<()>;

    async fn find_note(&self, vault_id: &str, note_id: &str) -> Result<Option<StoredMeta>>;

    async fn insert_note(&self, vault_id: &str, note: &NoteRecord) -> Result<()>;

    async fn upsert_scan_root(&self, result: &ScanResult) -> Result<()>;

    /// Non-blank lines stored for a text file, repo file, or note, in
    /// line order.
    async fn lines(&self, owner_id: &str) -> Result<Vec<LineRecord>>;
}

/// Lines that get their own row: everything except blank lines.
pub fn shreddable_lines(record: &FileRecord) -> Vec<&LineRecord> {
    record
        .lines()
        .map(|lines| lines.iter().filter(|l| !l.is_empty).collect())
        .unwrap_or_default()
}
