//! In-memory [`CatalogStore`] implementation for tests and embedding.
//!
//! Uses `HashMap`s behind a single `std::sync::RwLock`. Line rows are kept
//! per owner, mirroring the SQLite store's delete-then-reinsert.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::record::{FileRecord, LineRecord};
use crate::repo::{RepoFile, RepoRecord};
use crate::scan::ScanResult;
use crate::vault::{NoteRecord, VaultRecord};

use super::{shreddable_lines, CatalogStore, StoredMeta};

#[derive(Default)]
struct Tables {
    files: HashMap<String, (StoredMeta, FileRecord)>,
    repos: HashMap<String, (StoredMeta, RepoRecord)>,
    repo_files: HashMap<(String, String), StoredMeta>,
    vaults: HashMap<String, (StoredMeta, VaultRecord)>,
    notes: HashMap<(String, String), StoredMeta>,
    scan_roots: HashMap<String, serde_json::Value>,
    lines: HashMap<String, Vec<LineRecord>>,
}

impl Tables {
    fn shred(&mut self, record: &FileRecord) {
        let lines = shreddable_lines(record).into_iter().cloned().collect();
        self.lines.insert(record.id().to_string(), lines);
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loose file records stored.
    pub fn file_count(&self) -> usize {
        self.read().map(|t| t.files.len()).unwrap_or(0)
    }

    pub fn scan_root_details(&self, root: &str) -> Option<serde_json::Value> {
        self.read().ok()?.scan_roots.get(root).cloned()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| anyhow!("store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| anyhow!("store lock poisoned"))
    }
}

fn new_meta(id: &str) -> StoredMeta {
    let now = Utc::now();
    StoredMeta {
        id: id.to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_file(&self, id: &str) -> Result<Option<StoredMeta>> {
        Ok(self.read()?.files.get(id).map(|(m, _)| m.clone()))
    }

    async fn insert_file(&self, record: &FileRecord) -> Result<()> {
        let mut t = self.write()?;
        if t.files.contains_key(record.id()) {
            bail!("file {} already stored", record.id());
        }
        t.files
            .insert(record.id().to_string(), (new_meta(record.id()), record.clone()));
        t.shred(record);
        Ok(())
    }

    async fn get_file(&self, id: &str) -> Result<Option<FileRecord>> {
        Ok(self.read()?.files.get(id).map(|(_, r)| r.clone()))
    }

    async fn find_repo(&self, id: &str) -> Result<Option<StoredMeta>> {
        Ok(self.read()?.repos.get(id).map(|(m, _)| m.clone()))
    }

    async fn upsert_repo(&self, repo: &RepoRecord) -> Result<()> {
        let mut t = self.write()?;
        let meta = match t.repos.get(repo.id()) {
            Some((existing, _)) => StoredMeta {
                updated_at: Utc::now(),
                ..existing.clone()
            },
            None => new_meta(repo.id()),
        };
        let mut stored = repo.clone();
        stored.files.clear();
        t.repos.insert(repo.id().to_string(), (meta, stored));
        Ok(())
    }

    async fn find_repo_file(&self, repo_id: &str, file_id: &str) -> Result<Option<StoredMeta>> {
        Ok(self
            .read()?
            .repo_files
            .get(&(repo_id.to_string(), file_id.to_string()))
            .cloned())
    }

    async fn insert_repo_file(&self, repo_id: &str, file: &RepoFile) -> Result<()> {
        let mut t = self.write()?;
        let key = (repo_id.to_string(), file.record.id().to_string());
        if t.repo_files.contains_key(&key) {
            bail!("repo file {} already stored", file.record.id());
        }
        t.repo_files.insert(key, new_meta(file.record.id()));
        t.shred(&file.record);
        Ok(())
    }

    async fn find_vault(&self, id: &str) -> Result<Option<StoredMeta>> {
        Ok(self.read()?.vaults.get(id).map(|(m, _)| m.clone()))
    }

    async fn upsert_vault(&self, vault: &VaultRecord) -> Result<()> {
        let mut t = self.write()?;
        let meta = match t.vaults.get(vault.id()) {
            Some((existing, _)) => StoredMeta {
                updated_at: Utc::now(),
                ..existing.clone()
            },
            None => new_meta(vault.id()),
        };
        let mut stored = vault.clone();
        stored.notes.clear();
        t.vaults.insert(vault.id().to_string(), (meta, stored));
        Ok(())
    }

    async fn find_note(&self, vault_id: &str, note_id: &str) -> Result<Option<StoredMeta>> {
        Ok(self
            .read()?
            .notes
            .get(&(vault_id.to_string(), note_id.to_string()))
            .cloned())
    }

    async fn insert_note(&self, vault_id: &str, note: &NoteRecord) -> Result<()> {
        let mut t = self.write()?;
        let key = (vault_id.to_string(), note.id().to_string());
        if t.notes.contains_key(&key) {
            bail!("note {} already stored", note.id());
        }
        t.notes.insert(key, new_meta(note.id()));
        t.shred(&note.record);
        Ok(())
    }

    async fn upsert_scan_root(&self, result: &ScanResult) -> Result<()> {
        self.write()?
            .scan_roots
            .insert(result.root.clone(), result.details());
        Ok(())
    }

    async fn lines(&self, owner_id: &str) -> Result<Vec<LineRecord>> {
        Ok(self.read()?.lines.get(owner_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathDescriptor;
    use crate::record::fixtures::{stat, text_record};
    use crate::record::DirectoryRecord;
    use crate::repo::RepoType;
    use std::path::Path;

    fn repo() -> RepoRecord {
        RepoRecord {
            directory: DirectoryRecord::new(
                PathDescriptor::from_path(Path::new("/src/app")),
                stat(0),
                0,
                0,
            ),
            repo_type: RepoType::GitLocal,
            url: None,
            git_metadata: None,
            last_seen: Utc::now(),
            files: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_file_shreds_non_blank_lines() {
        let store = InMemoryStore::new();
        let rec = text_record("/n/a.md", "# Title\n\nBody");
        store.insert_file(&rec).await.unwrap();

        let lines = store.lines(rec.id()).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].line_number, 1);
        assert_eq!(lines[1].line_number, 3);
        assert!(store.find_file(rec.id()).await.unwrap().is_some());
        assert_eq!(store.get_file(rec.id()).await.unwrap(), Some(rec.clone()));
        assert!(store.insert_file(&rec).await.is_err());
        assert_eq!(store.file_count(), 1);
    }

    #[tokio::test]
    async fn test_upsert_repo_keeps_created_at() {
        let store = InMemoryStore::new();
        let r = repo();
        store.upsert_repo(&r).await.unwrap();
        let first = store.find_repo(r.id()).await.unwrap().unwrap();
        store.upsert_repo(&r).await.unwrap();
        let second = store.find_repo(r.id()).await.unwrap().unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_repo_files_are_scoped_to_repo() {
        let store = InMemoryStore::new();
        let file = RepoFile {
            repo_path: "a.md".to_string(),
            record: text_record("/src/app/a.md", "a"),
        };
        store.insert_repo_file("r1", &file).await.unwrap();
        assert!(store.find_repo_file("r1", file.record.id()).await.unwrap().is_some());
        assert!(store.find_repo_file("r2", file.record.id()).await.unwrap().is_none());
        assert!(store.find_file(file.record.id()).await.unwrap().is_none());
    }
}
