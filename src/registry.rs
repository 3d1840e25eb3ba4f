//! Tracked Git repositories.
//!
//! The registry keeps two tables: local working trees (`local_repos`) and
//! remote repositories cloned into managed storage (`cloned_repos`). Managed
//! storage lives under `storage.root`:
//!
//! ```text
//! <storage.root>/
//!   remotes/<repo name>/   # clones, named after the URL's last segment
//!   locals/<dir name>/     # optional mirrors of local working trees
//! ```
//!
//! Entries are only removed explicitly. Removing an entry leaves managed
//! storage on disk untouched.
//!
//! Concurrent operations on the same repository path are not guarded;
//! callers serialize them.

use chrono::Utc;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::db::to_datetime;
use crate::error::{CatalogError, Result};
use crate::git;
use crate::scanner::Scanner;
use crate::stream::EventStream;
use file_catalog_core::formats::ScanMode;
use file_catalog_core::registry::{
    ClonedRepoEntry, LocalRepoEntry, RegistryEntry, RepoFilter, UpdateOutcome,
};
use file_catalog_core::repo::{RepoFile, RepoRecord, RepoType};

type LocalRow = (String, String, Option<String>, i64, Option<i64>);
type ClonedRow = (String, String, String, i64, Option<i64>);

#[derive(Clone)]
pub struct RepoRegistry {
    pool: SqlitePool,
    config: Config,
    scanner: Scanner,
}

impl RepoRegistry {
    /// Create the registry, making sure the managed storage directories
    /// exist. Expects migrations to have run.
    ///
    /// The storage root is resolved to an absolute path so stored entries
    /// stay valid from any working directory.
    pub fn new(pool: SqlitePool, mut config: Config) -> Result<Self> {
        std::fs::create_dir_all(config.storage.remotes_dir())?;
        std::fs::create_dir_all(config.storage.locals_dir())?;
        config.storage.root = std::fs::canonicalize(&config.storage.root)?;
        Ok(Self {
            scanner: Scanner::new(&config)?,
            pool,
            config,
        })
    }

    fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.config.git.timeout_secs)
    }

    // ── Registration ────────────────────────────────────────────────

    /// Track a local working tree. With `copy`, the tree is mirrored into
    /// managed storage and scans read the mirror.
    pub async fn add_local(&self, path: &Path, copy: bool) -> Result<LocalRepoEntry> {
        let scan_path = canonical_dir(path).await?;
        let key = scan_path.to_string_lossy().to_string();

        if self.get_local(&key).await?.is_some() {
            return Err(CatalogError::already_exists(key));
        }

        let storage_path = if copy {
            let name = scan_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "root".to_string());
            let target = self.config.storage.locals_dir().join(name);
            if target.exists() {
                return Err(CatalogError::already_exists(target.display().to_string()));
            }
            copy_tree(&scan_path, &target, &self.config.storage.root)
                .await
                .map_err(|source| {
                    let _ = std::fs::remove_dir_all(&target);
                    CatalogError::Cloning {
                        url: key.clone(),
                        source,
                    }
                })?;
            Some(target.to_string_lossy().to_string())
        } else {
            None
        };

        let entry = LocalRepoEntry {
            id: Uuid::new_v4().to_string(),
            scan_path: key,
            storage_path,
            added_at: Utc::now(),
            updated_at: None,
        };
        sqlx::query(
            "INSERT INTO local_repos (id, scan_path, storage_path, added_at, updated_at) VALUES (?, ?, ?, ?, NULL)",
        )
        .bind(&entry.id)
        .bind(&entry.scan_path)
        .bind(&entry.storage_path)
        .bind(entry.added_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| unique_to_exists(e, &entry.scan_path))?;

        info!(path = %entry.scan_path, copied = copy, "local repository added");
        Ok(entry)
    }

    /// Clone a remote repository into managed storage and track it.
    pub async fn add_remote(&self, url: &str) -> Result<ClonedRepoEntry> {
        if self.get_remote(url).await?.is_some() {
            return Err(CatalogError::already_exists(url));
        }

        let target = self
            .config
            .storage
            .remotes_dir()
            .join(git::repo_name_from_url(url));
        if target.exists() {
            return Err(CatalogError::already_exists(target.display().to_string()));
        }

        info!(url, target = %target.display(), "cloning");
        if let Err(source) = git::clone(url, &target, self.git_timeout()).await {
            if target.exists() {
                let _ = std::fs::remove_dir_all(&target);
            }
            return Err(CatalogError::Cloning {
                url: url.to_string(),
                source,
            });
        }

        let entry = ClonedRepoEntry {
            id: Uuid::new_v4().to_string(),
            remote_url: url.to_string(),
            storage_path: target.to_string_lossy().to_string(),
            added_at: Utc::now(),
            updated_at: None,
        };
        sqlx::query(
            "INSERT INTO cloned_repos (id, remote_url, storage_path, added_at, updated_at) VALUES (?, ?, ?, ?, NULL)",
        )
        .bind(&entry.id)
        .bind(&entry.remote_url)
        .bind(&entry.storage_path)
        .bind(entry.added_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| unique_to_exists(e, url))?;

        Ok(entry)
    }

    // ── Lookup ──────────────────────────────────────────────────────

    pub async fn get_local(&self, scan_path: &str) -> Result<Option<LocalRepoEntry>> {
        let row: Option<LocalRow> = sqlx::query_as(
            "SELECT id, scan_path, storage_path, added_at, updated_at FROM local_repos WHERE scan_path = ?",
        )
        .bind(scan_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(local_from_row))
    }

    pub async fn get_remote(&self, url: &str) -> Result<Option<ClonedRepoEntry>> {
        let row: Option<ClonedRow> = sqlx::query_as(
            "SELECT id, remote_url, storage_path, added_at, updated_at FROM cloned_repos WHERE remote_url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(cloned_from_row))
    }

    pub async fn list(&self, filter: RepoFilter) -> Result<Vec<RegistryEntry>> {
        let mut entries = Vec::new();
        if filter.includes_local() {
            entries.extend(self.list_local().await?.into_iter().map(RegistryEntry::Local));
        }
        if filter.includes_cloned() {
            entries.extend(self.list_cloned().await?.into_iter().map(RegistryEntry::Cloned));
        }
        Ok(entries)
    }

    async fn list_local(&self) -> Result<Vec<LocalRepoEntry>> {
        let rows: Vec<LocalRow> = sqlx::query_as(
            "SELECT id, scan_path, storage_path, added_at, updated_at FROM local_repos ORDER BY scan_path",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(local_from_row).collect())
    }

    async fn list_cloned(&self) -> Result<Vec<ClonedRepoEntry>> {
        let rows: Vec<ClonedRow> = sqlx::query_as(
            "SELECT id, remote_url, storage_path, added_at, updated_at FROM cloned_repos ORDER BY remote_url",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(cloned_from_row).collect())
    }

    // ── Removal ─────────────────────────────────────────────────────

    /// Stop tracking a local tree. Accepts the path as registered or any
    /// path that canonicalizes to it.
    pub async fn remove_local(&self, path: &Path) -> Result<()> {
        let key = match tokio::fs::canonicalize(path).await {
            Ok(p) => p.to_string_lossy().to_string(),
            Err(_) => path.to_string_lossy().to_string(),
        };
        let done = sqlx::query("DELETE FROM local_repos WHERE scan_path = ?")
            .bind(&key)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(CatalogError::NotFound(key));
        }
        info!(path = %key, "local repository removed");
        Ok(())
    }

    pub async fn remove_remote(&self, url: &str) -> Result<()> {
        let done = sqlx::query("DELETE FROM cloned_repos WHERE remote_url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(CatalogError::NotFound(url.to_string()));
        }
        info!(url, "cloned repository removed");
        Ok(())
    }

    // ── Updates ─────────────────────────────────────────────────────

    /// Fast-forward every clone, one outcome per repository.
    pub fn update_all_remotes(&self) -> EventStream<UpdateOutcome> {
        let this = self.clone();
        EventStream::spawn(move |emitter| async move {
            let entries = match this.list_cloned().await {
                Ok(entries) => entries,
                Err(e) => return emitter.fail(e).await,
            };
            for entry in entries {
                let outcome = match git::pull(Path::new(&entry.storage_path), this.git_timeout()).await {
                    Ok(()) => {
                        this.touch("cloned_repos", &entry.id).await;
                        UpdateOutcome {
                            target: entry.remote_url.clone(),
                            success: true,
                            message: "pulled".to_string(),
                        }
                    }
                    Err(e) => failed(&entry.remote_url, e),
                };
                if !emitter.emit(outcome).await {
                    return;
                }
            }
        })
    }

    /// Refresh every local entry. Mirrored entries are re-copied from their
    /// working tree unless `in_place` is set, in which case (and for
    /// entries without a mirror) the working tree itself is pulled.
    pub fn update_all_locals(&self, in_place: bool) -> EventStream<UpdateOutcome> {
        let this = self.clone();
        EventStream::spawn(move |emitter| async move {
            let entries = match this.list_local().await {
                Ok(entries) => entries,
                Err(e) => return emitter.fail(e).await,
            };
            for entry in entries {
                let result = match (&entry.storage_path, in_place) {
                    (Some(mirror), false) => {
                        refresh_mirror(
                            Path::new(&entry.scan_path),
                            Path::new(mirror),
                            &this.config.storage.root,
                        )
                        .await
                            .map(|_| "mirror refreshed")
                    }
                    _ => git::pull(Path::new(&entry.scan_path), this.git_timeout())
                        .await
                        .map(|_| "pulled"),
                };
                let outcome = match result {
                    Ok(message) => {
                        this.touch("local_repos", &entry.id).await;
                        UpdateOutcome {
                            target: entry.scan_path.clone(),
                            success: true,
                            message: message.to_string(),
                        }
                    }
                    Err(e) => failed(&entry.scan_path, e),
                };
                if !emitter.emit(outcome).await {
                    return;
                }
            }
        })
    }

    async fn touch(&self, table: &str, id: &str) {
        let result = sqlx::query(&format!("UPDATE {} SET updated_at = ? WHERE id = ?", table))
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            warn!(table, id, error = %e, "failed to bump updated_at");
        }
    }

    // ── Scanning ────────────────────────────────────────────────────

    /// Snapshot a repository: directory record, git state, and files.
    /// A directory that is not a git working tree yields no metadata.
    pub async fn scan_repo(&self, path: &Path, repo_type: RepoType) -> Result<RepoRecord> {
        let root = canonical_dir(path).await?;
        let directory = self.scanner.classifier().populate_directory(&root).await?;
        let git_metadata = git::extract_metadata(&root, self.config.git.history_depth).await;
        if git_metadata.is_none() {
            debug!(path = %root.display(), "no git metadata");
        }

        let mode = match repo_type {
            RepoType::GitLocal => ScanMode::GitLocal,
            RepoType::GitCloned => ScanMode::GitCloned,
        };
        let scan = self.scanner.scan(&root, mode).await?;
        let files = scan
            .records
            .into_iter()
            .map(|record| {
                let full = record.path().to_path_buf();
                let relative = full.strip_prefix(&root).unwrap_or(&full);
                RepoFile {
                    repo_path: to_slash(relative),
                    record,
                }
            })
            .collect();

        Ok(RepoRecord {
            url: git_metadata
                .as_ref()
                .and_then(|m| m.origin())
                .map(str::to_string),
            directory,
            repo_type,
            git_metadata,
            last_seen: Utc::now(),
            files,
        })
    }
}

fn local_from_row(row: LocalRow) -> LocalRepoEntry {
    LocalRepoEntry {
        id: row.0,
        scan_path: row.1,
        storage_path: row.2,
        added_at: to_datetime(row.3),
        updated_at: row.4.map(to_datetime),
    }
}

fn cloned_from_row(row: ClonedRow) -> ClonedRepoEntry {
    ClonedRepoEntry {
        id: row.0,
        remote_url: row.1,
        storage_path: row.2,
        added_at: to_datetime(row.3),
        updated_at: row.4.map(to_datetime),
    }
}

fn unique_to_exists(err: sqlx::Error, key: &str) -> CatalogError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => CatalogError::already_exists(key),
        _ => err.into(),
    }
}

fn failed(target: &str, err: anyhow::Error) -> UpdateOutcome {
    warn!(target, error = %err, "update failed");
    UpdateOutcome {
        target: target.to_string(),
        success: false,
        message: err.to_string(),
    }
}

async fn canonical_dir(path: &Path) -> Result<PathBuf> {
    match tokio::fs::canonicalize(path).await {
        Ok(p) if p.is_dir() => Ok(p),
        Ok(_) => Err(CatalogError::not_found(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CatalogError::not_found(path)),
        Err(e) => Err(e.into()),
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Mirror `src` into `dest` (which must not exist), `.git` included.
/// Symlinks are not followed or recreated. Anything under `storage` is left
/// out, so a tree holding the managed storage never copies into itself.
async fn copy_tree(src: &Path, dest: &Path, storage: &Path) -> anyhow::Result<()> {
    let src = src.to_path_buf();
    let dest = dest.to_path_buf();
    let storage = storage.to_path_buf();
    tokio::task::spawn_blocking(move || copy_tree_blocking(&src, &dest, &storage)).await?
}

fn copy_tree_blocking(src: &Path, dest: &Path, storage: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    let walker = WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.path().starts_with(storage));
    for entry in walker {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dest.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Staging directory for a mirror refresh: `<mirror name>.refresh`.
fn staging_path(mirror: &Path) -> anyhow::Result<PathBuf> {
    let name = mirror
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("mirror path has no name: {}", mirror.display()))?;
    Ok(mirror.with_file_name(format!("{}.refresh", name.to_string_lossy())))
}

/// Re-copy `src` into a sibling of `mirror`, then swap it in.
async fn refresh_mirror(src: &Path, mirror: &Path, storage: &Path) -> anyhow::Result<()> {
    if !src.is_dir() {
        anyhow::bail!("working tree missing: {}", src.display());
    }
    let staging = staging_path(mirror)?;
    if staging.exists() {
        tokio::fs::remove_dir_all(&staging).await?;
    }
    copy_tree(src, &staging, storage).await?;
    if mirror.exists() {
        tokio::fs::remove_dir_all(mirror).await?;
    }
    tokio::fs::rename(&staging, mirror).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("src/bin/main.rs")), "src/bin/main.rs");
        assert_eq!(to_slash(Path::new("README.md")), "README.md");
    }

    #[test]
    fn test_copy_tree_mirrors_nested_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join(".git/refs")).unwrap();
        std::fs::write(src.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        std::fs::write(src.join("a.txt"), "a").unwrap();

        let dest = tmp.path().join("dest");
        copy_tree_blocking(&src, &dest, &tmp.path().join("storage")).unwrap();
        assert_eq!(std::fs::read_to_string(dest.join("a.txt")).unwrap(), "a");
        assert!(dest.join(".git/HEAD").exists());
        assert!(dest.join(".git/refs").is_dir());
    }

    #[test]
    fn test_copy_tree_skips_storage_inside_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = tmp.path().join("proj");
        let storage = src.join("data/repos");
        std::fs::create_dir_all(storage.join("remotes/other")).unwrap();
        std::fs::write(storage.join("remotes/other/x.txt"), "x").unwrap();
        std::fs::write(src.join("main.rs"), "fn main() {}").unwrap();

        let dest = storage.join("locals/proj");
        copy_tree_blocking(&src, &dest, &storage).unwrap();
        assert!(dest.join("main.rs").exists());
        assert!(dest.join("data").is_dir());
        assert!(!dest.join("data/repos").exists());
    }

    #[test]
    fn test_staging_path_appends_suffix() {
        assert_eq!(
            staging_path(Path::new("/s/locals/app.v2")).unwrap(),
            Path::new("/s/locals/app.v2.refresh")
        );
        assert_eq!(
            staging_path(Path::new("/s/locals/app")).unwrap(),
            Path::new("/s/locals/app.refresh")
        );
    }
}
