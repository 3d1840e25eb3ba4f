//! Import pipeline: scanned records → catalog store.
//!
//! Each entry point runs on a spawned task and streams [`ImportEvent`]s:
//! `Initiated`, one event per item as soon as its outcome is known, then
//! `Completed` with totals. Records are content-addressed, so an item whose
//! ID is already stored is reported as `Conflict` and not written again.
//! Repositories and vaults are containers and are merged instead.
//!
//! A store failure ends the stream with a terminal
//! [`CatalogError::Persistence`]; items committed before it stay committed.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::CatalogError;
use crate::stream::{Emitter, EventStream};
use file_catalog_core::event::{ImportCounts, ImportEvent, ImportStatus};
use file_catalog_core::record::{FileRecord, Summarize};
use file_catalog_core::repo::RepoRecord;
use file_catalog_core::scan::ScanResult;
use file_catalog_core::store::CatalogStore;
use file_catalog_core::vault::VaultRecord;

#[derive(Clone)]
pub struct Importer {
    store: Arc<dyn CatalogStore>,
}

/// Tracks totals and forwards events to the consumer.
struct Progress {
    emitter: Emitter<ImportEvent>,
    counts: ImportCounts,
}

/// Why an import stopped early.
enum Halt {
    /// The consumer dropped the stream.
    Closed,
    Failed(CatalogError),
}

type Step = std::result::Result<(), Halt>;

impl Progress {
    async fn start(emitter: Emitter<ImportEvent>, what: String) -> Option<Self> {
        let ok = emitter
            .emit(ImportEvent::new(ImportStatus::Initiated, what))
            .await;
        ok.then_some(Self {
            emitter,
            counts: ImportCounts::default(),
        })
    }

    async fn item(&mut self, status: ImportStatus, id: &str, message: String) -> Step {
        self.counts.record(status);
        debug!(%status, id, "import item");
        if self
            .emitter
            .emit(ImportEvent::for_item(status, id, message))
            .await
        {
            Ok(())
        } else {
            Err(Halt::Closed)
        }
    }

    async fn finish(self, result: Step) {
        match result {
            Ok(()) => {
                info!(counts = %self.counts, "import completed");
                self.emitter
                    .emit(ImportEvent::new(
                        ImportStatus::Completed,
                        self.counts.to_string(),
                    ))
                    .await;
            }
            Err(Halt::Closed) => debug!("import stream dropped by consumer"),
            Err(Halt::Failed(err)) => self.emitter.fail(err).await,
        }
    }
}

/// Log a store failure and turn it into the terminal error.
fn persistence(id: &str, err: anyhow::Error) -> Halt {
    error!(id, error = %err, "failed to persist item");
    Halt::Failed(CatalogError::persistence(id, err))
}

impl Importer {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Import loose file records.
    pub fn import_files(&self, records: Vec<FileRecord>) -> EventStream<ImportEvent> {
        let store = self.store.clone();
        EventStream::spawn(move |emitter| async move {
            let what = format!("importing {} files", records.len());
            let Some(mut progress) = Progress::start(emitter, what).await else {
                return;
            };
            let result = import_file_records(store.as_ref(), &mut progress, &records).await;
            progress.finish(result).await;
        })
    }

    /// Record the scan root, then import its files.
    pub fn import_scan(&self, scan: ScanResult) -> EventStream<ImportEvent> {
        let store = self.store.clone();
        EventStream::spawn(move |emitter| async move {
            let what = format!("importing scan of {} ({} files)", scan.root, scan.records.len());
            let Some(mut progress) = Progress::start(emitter, what).await else {
                return;
            };
            let result = match store.upsert_scan_root(&scan).await {
                Ok(()) => import_file_records(store.as_ref(), &mut progress, &scan.records).await,
                Err(e) => Err(persistence(&scan.root, e)),
            };
            progress.finish(result).await;
        })
    }

    /// Merge the repository row, then import its files.
    pub fn import_repo(&self, repo: RepoRecord) -> EventStream<ImportEvent> {
        let store = self.store.clone();
        EventStream::spawn(move |emitter| async move {
            let what = format!("importing {}", repo.summary());
            let Some(mut progress) = Progress::start(emitter, what).await else {
                return;
            };
            let result = import_repo_inner(store.as_ref(), &mut progress, &repo).await;
            progress.finish(result).await;
        })
    }

    /// Merge the vault row, then import its notes.
    pub fn import_vault(&self, vault: VaultRecord) -> EventStream<ImportEvent> {
        let store = self.store.clone();
        EventStream::spawn(move |emitter| async move {
            let what = format!("importing {}", vault.summary());
            let Some(mut progress) = Progress::start(emitter, what).await else {
                return;
            };
            let result = import_vault_inner(store.as_ref(), &mut progress, &vault).await;
            progress.finish(result).await;
        })
    }
}

async fn import_file_records(
    store: &dyn CatalogStore,
    progress: &mut Progress,
    records: &[FileRecord],
) -> Step {
    for record in records {
        let id = record.id();
        let existing = store.find_file(id).await.map_err(|e| persistence(id, e))?;
        let status = match existing {
            Some(_) => ImportStatus::Conflict,
            None => {
                store
                    .insert_file(record)
                    .await
                    .map_err(|e| persistence(id, e))?;
                ImportStatus::Created
            }
        };
        progress.item(status, id, record.summary()).await?;
    }
    Ok(())
}

async fn import_repo_inner(
    store: &dyn CatalogStore,
    progress: &mut Progress,
    repo: &RepoRecord,
) -> Step {
    let repo_id = repo.id();
    let existing = store
        .find_repo(repo_id)
        .await
        .map_err(|e| persistence(repo_id, e))?;
    store
        .upsert_repo(repo)
        .await
        .map_err(|e| persistence(repo_id, e))?;
    let status = if existing.is_some() {
        ImportStatus::Updated
    } else {
        ImportStatus::Created
    };
    progress.item(status, repo_id, repo.summary()).await?;

    for file in &repo.files {
        let id = file.record.id();
        let existing = store
            .find_repo_file(repo_id, id)
            .await
            .map_err(|e| persistence(id, e))?;
        let status = match existing {
            Some(_) => ImportStatus::Conflict,
            None => {
                store
                    .insert_repo_file(repo_id, file)
                    .await
                    .map_err(|e| persistence(id, e))?;
                ImportStatus::Created
            }
        };
        progress.item(status, id, file.repo_path.clone()).await?;
    }
    Ok(())
}

async fn import_vault_inner(
    store: &dyn CatalogStore,
    progress: &mut Progress,
    vault: &VaultRecord,
) -> Step {
    let vault_id = vault.id();
    let existing = store
        .find_vault(vault_id)
        .await
        .map_err(|e| persistence(vault_id, e))?;
    store
        .upsert_vault(vault)
        .await
        .map_err(|e| persistence(vault_id, e))?;
    let status = if existing.is_some() {
        ImportStatus::Updated
    } else {
        ImportStatus::Created
    };
    progress.item(status, vault_id, vault.summary()).await?;

    for note in &vault.notes {
        let id = note.id();
        let existing = store
            .find_note(vault_id, id)
            .await
            .map_err(|e| persistence(id, e))?;
        let status = match existing {
            Some(_) => ImportStatus::Conflict,
            None => {
                store
                    .insert_note(vault_id, note)
                    .await
                    .map_err(|e| persistence(id, e))?;
                ImportStatus::Created
            }
        };
        progress.item(status, id, note.vault_path.clone()).await?;
    }
    Ok(())
}
