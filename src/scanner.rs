//! Recursive tree scanning.
//!
//! The walk is synchronous (`walkdir`, on the blocking pool) and prunes
//! ignored directories before descending. Matching files are then populated
//! with bounded concurrency, keeping walk order. A file that fails to
//! populate is logged and recorded as skipped; the scan goes on.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::classify::Classifier;
use crate::config::{Config, ScanConfig};
use crate::error::{CatalogError, Result};
use file_catalog_core::formats::{
    has_ignored_extension, ignore_extensions_with, ScanMode, IGNORE_PARTS,
};
use file_catalog_core::record::FileRecord;
use file_catalog_core::scan::{ScanResult, SkippedEntry};

#[derive(Clone)]
pub struct Scanner {
    classifier: Classifier,
    settings: ScanConfig,
    ignore_parts: GlobSet,
    ignore_extensions: Vec<String>,
    exclude_set: GlobSet,
}

/// Files chosen by the walk, plus entries it could not read.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedEntry>,
}

impl Scanner {
    pub fn new(config: &Config) -> Result<Self> {
        let mut parts: Vec<String> = IGNORE_PARTS.iter().map(|p| p.to_string()).collect();
        parts.extend(config.scan.extra_ignore_parts.iter().cloned());

        Ok(Self {
            classifier: Classifier::new(config),
            settings: config.scan.clone(),
            ignore_parts: build_globset(&parts)?,
            ignore_extensions: ignore_extensions_with(&config.scan.extra_ignore_extensions),
            exclude_set: build_globset(&config.scan.exclude_globs)?,
        })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Scan `root` for files in scope of `mode`.
    pub async fn scan(&self, root: &Path, mode: ScanMode) -> Result<ScanResult> {
        with_deadline(
            self.settings.timeout_secs,
            || format!("scan of {}", root.display()),
            self.scan_inner(root, mode),
        )
        .await
    }

    async fn scan_inner(&self, root: &Path, mode: ScanMode) -> Result<ScanResult> {
        let root = match tokio::fs::canonicalize(root).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::not_found(root))
            }
            Err(e) => return Err(e.into()),
        };
        let started_at = Utc::now();
        info!(root = %root.display(), %mode, "scan started");

        let walk = if root.is_file() {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let files = if self.selects(&name, mode) {
                vec![root.clone()]
            } else {
                debug!(path = %root.display(), %mode, "file root not in scope");
                Vec::new()
            };
            WalkOutcome {
                files,
                skipped: Vec::new(),
            }
        } else {
            let this = self.clone();
            let walk_root = root.clone();
            tokio::task::spawn_blocking(move || this.walk(&walk_root, mode))
                .await
                .map_err(|e| CatalogError::Io(std::io::Error::other(e)))?
        };

        let (records, mut skipped) = self.populate_all(walk.files).await;
        skipped.extend(walk.skipped);

        let result = ScanResult {
            root: root.to_string_lossy().to_string(),
            mode,
            started_at,
            ended_at: Utc::now(),
            records,
            skipped,
        };
        info!(
            root = %result.root,
            records = result.records.len(),
            skipped = result.skipped.len(),
            duration_ms = result.duration().num_milliseconds(),
            "scan finished"
        );
        Ok(result)
    }

    /// Populate files concurrently, preserving input order.
    async fn populate_all(&self, files: Vec<PathBuf>) -> (Vec<FileRecord>, Vec<SkippedEntry>) {
        let classifier = &self.classifier;
        let results: Vec<(PathBuf, Result<FileRecord>)> = stream::iter(files)
            .map(|path| async move {
                let result = classifier.populate(&path).await;
                (path, result)
            })
            .buffered(self.settings.workers.max(1))
            .collect()
            .await;

        let mut records = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (path, result) in results {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping file");
                    skipped.push(SkippedEntry {
                        path: path.to_string_lossy().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        (records, skipped)
    }

    /// Walk `root` depth-first in name order, applying ignore rules and the
    /// mode filter. The root itself is never pruned.
    pub fn walk(&self, root: &Path, mode: ScanMode) -> WalkOutcome {
        let mut outcome = WalkOutcome::default();

        let walker = WalkDir::new(root)
            .follow_links(self.settings.follow_symlinks)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_ignored_part(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.to_string_lossy().to_string())
                        .unwrap_or_default();
                    warn!(path = %path, error = %e, "walk error");
                    outcome.skipped.push(SkippedEntry {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.exclude_set.is_match(relative) {
                continue;
            }
            if !self.selects(&entry.file_name().to_string_lossy(), mode) {
                continue;
            }

            outcome.files.push(path.to_path_buf());
        }

        outcome
    }

    fn is_ignored_part(&self, entry: &DirEntry) -> bool {
        self.ignore_parts.is_match(entry.file_name())
    }

    /// Whether a file named `name` passes the extension ignore list and the
    /// mode filter.
    fn selects(&self, name: &str, mode: ScanMode) -> bool {
        if has_ignored_extension(name, &self.ignore_extensions) {
            debug!(name, "ignored extension");
            return false;
        }
        let ext = Path::new(name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        mode.accepts(&ext)
    }
}

/// Run `fut` under an optional deadline of `secs` seconds.
async fn with_deadline<T>(
    secs: Option<u64>,
    what: impl FnOnce() -> String,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), fut)
            .await
            .map_err(|_| CatalogError::TimedOut { what: what(), secs })?,
        None => fut.await,
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern)
                .map_err(|e| CatalogError::Config(format!("bad glob '{}': {}", pattern, e)))?,
        );
    }
    builder
        .build()
        .map_err(|e| CatalogError::Config(e.to_string()))
}
