//! Obsidian vault scanning.
//!
//! A vault is any directory scanned in `obsidian-vault` mode; the
//! `.obsidian` folder is recorded when present but not required.

use chrono::Utc;
use std::path::Path;
use tracing::info;

use crate::classify::Classifier;
use crate::error::{CatalogError, Result};
use crate::scanner::Scanner;
use file_catalog_core::formats::{ScanMode, VAULT_MARKER};
use file_catalog_core::record::FileKind;
use file_catalog_core::vault::{NoteRecord, VaultRecord};

/// Scan `path` as a vault: directory record, marker check, and one note per
/// Markdown/text file.
pub async fn scan_vault(scanner: &Scanner, path: &Path) -> Result<VaultRecord> {
    let root = match tokio::fs::canonicalize(path).await {
        Ok(p) if p.is_dir() => p,
        Ok(_) => return Err(CatalogError::not_found(path)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CatalogError::not_found(path))
        }
        Err(e) => return Err(e.into()),
    };

    let directory = scanner.classifier().populate_directory(&root).await?;
    let has_marker = root.join(VAULT_MARKER).is_dir();
    let scan = scanner.scan(&root, ScanMode::ObsidianVault).await?;

    let notes: Vec<NoteRecord> = scan
        .records
        .into_iter()
        .map(|record| {
            let vault_path = relative_slash(&root, Path::new(&record.path().full));
            NoteRecord::from_record(record, vault_path)
        })
        .collect();

    info!(
        path = %root.display(),
        notes = notes.len(),
        has_marker,
        "vault scanned"
    );

    Ok(VaultRecord {
        directory,
        has_marker,
        last_seen: Utc::now(),
        notes,
    })
}

/// Build a single note. The file must be a text file under `vault_root`.
pub async fn populate_note(
    classifier: &Classifier,
    path: &Path,
    vault_root: &Path,
) -> Result<NoteRecord> {
    let record = classifier.populate_as(path, FileKind::Text).await?;
    let root = std::path::absolute(vault_root)?;
    let vault_path = relative_slash(&root, Path::new(&record.path().full));
    Ok(NoteRecord::from_record(record, vault_path))
}

fn relative_slash(root: &Path, full: &Path) -> String {
    full.strip_prefix(root)
        .unwrap_or(full)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
