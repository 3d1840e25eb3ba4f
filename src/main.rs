//! # File Catalog CLI (`fcat`)
//!
//! The `fcat` binary scans directory trees, Obsidian vaults, and Git
//! repositories into a SQLite catalog, and manages the registry of tracked
//! repositories.
//!
//! ## Usage
//!
//! ```bash
//! fcat --config ./config/catalog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fcat init` | Create the SQLite database and run schema migrations |
//! | `fcat scan <root>` | Scan a tree, optionally importing the records |
//! | `fcat vault <root>` | Scan an Obsidian vault, optionally importing it |
//! | `fcat repo add-local <path>` | Track a local working tree |
//! | `fcat repo add-remote <url>` | Clone and track a remote repository |
//! | `fcat repo list` | List tracked repositories |
//! | `fcat repo update` | Pull clones and refresh local entries |
//! | `fcat repo remove-local <path>` / `remove-remote <url>` | Stop tracking |
//! | `fcat repo import <path>` | Scan a repository and import it |
//!
//! Import and update events go to stderr (human lines, or JSON lines with
//! `--json`); summaries go to stdout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;

use file_catalog::config::{self, Config};
use file_catalog::importer::Importer;
use file_catalog::logging::{init_logging, LogConfig};
use file_catalog::progress::{format_number, ProgressMode, ProgressReporter};
use file_catalog::registry::RepoRegistry;
use file_catalog::scanner::Scanner;
use file_catalog::sqlite_store::SqliteStore;
use file_catalog::stream::EventStream;
use file_catalog::{db, migrate, vault};
use file_catalog_core::event::{ImportEvent, ImportStatus};
use file_catalog_core::formats::ScanMode;
use file_catalog_core::record::Summarize;
use file_catalog_core::registry::{RegistryEntry, RepoFilter, UpdateOutcome};
use file_catalog_core::repo::RepoType;

/// File Catalog CLI: index files, vaults, and repositories into SQLite.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/catalog.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fcat",
    about = "File Catalog: a local file-system content indexer",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/catalog.toml")]
    config: PathBuf,

    /// Debug-level logging.
    #[arg(long, global = true)]
    verbose: bool,

    /// Render events as JSON lines on stderr.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all catalog tables. Safe to run
    /// repeatedly.
    Init,

    /// Scan a directory tree (or a single file).
    Scan {
        root: PathBuf,

        /// Scan mode: image, video, git-local, git-cloned, obsidian-vault,
        /// docs, pdf, or all.
        #[arg(long, default_value = "all")]
        mode: ScanMode,

        /// Import the scanned records into the catalog.
        #[arg(long)]
        import: bool,
    },

    /// Scan an Obsidian vault.
    Vault {
        root: PathBuf,

        #[arg(long)]
        import: bool,
    },

    /// Manage tracked repositories.
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },
}

#[derive(Subcommand)]
enum RepoAction {
    /// Track a local working tree.
    AddLocal {
        path: PathBuf,

        /// Mirror the tree into managed storage and scan the mirror.
        #[arg(long)]
        copy: bool,
    },

    /// Clone a remote repository into managed storage and track it.
    AddRemote { url: String },

    /// List tracked repositories.
    List {
        /// `all`, `local`, or `cloned`.
        #[arg(long, default_value = "all")]
        filter: RepoFilter,
    },

    /// Pull cloned repositories and refresh local entries.
    ///
    /// Without `--remotes` or `--locals`, both are updated.
    Update {
        #[arg(long)]
        remotes: bool,

        #[arg(long)]
        locals: bool,

        /// Pull local working trees instead of refreshing their mirrors.
        #[arg(long)]
        in_place: bool,
    },

    /// Stop tracking a local working tree. Files on disk are kept.
    RemoveLocal { path: PathBuf },

    /// Stop tracking a cloned repository. The clone on disk is kept.
    RemoveRemote { url: String },

    /// Scan a repository and import it into the catalog.
    Import {
        path: PathBuf,

        /// Record the repository as a managed clone.
        #[arg(long)]
        cloned: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(LogConfig {
        verbose: cli.verbose,
        plain: cli.json || !atty::is(atty::Stream::Stderr),
    })?;

    let cfg = config::load_config(&cli.config)?;
    let mode = if cli.json {
        ProgressMode::Json
    } else {
        ProgressMode::default_for_tty()
    };
    let reporter = mode.reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Scan { root, mode, import } => {
            let scanner = Scanner::new(&cfg)?;
            let result = scanner.scan(&root, mode).await?;

            println!("scan {}", result.root);
            println!("  mode: {}", result.mode);
            println!("  records: {}", format_number(result.records.len() as u64));
            println!("  skipped: {}", format_number(result.skipped.len() as u64));
            println!("  duration: {}ms", result.duration().num_milliseconds());
            for skipped in &result.skipped {
                println!("  skipped {}: {}", skipped.path, skipped.reason);
            }

            if import {
                let importer = open_importer(&cfg).await?;
                let summary = drain_import(importer.import_scan(result), reporter.as_ref()).await?;
                println!("  imported: {}", summary);
            }
            println!("ok");
        }
        Commands::Vault { root, import } => {
            let scanner = Scanner::new(&cfg)?;
            let record = vault::scan_vault(&scanner, &root).await?;
            println!("{}", record.summary());
            if !record.has_marker {
                println!("  note: no .obsidian folder found");
            }

            if import {
                let importer = open_importer(&cfg).await?;
                let summary = drain_import(importer.import_vault(record), reporter.as_ref()).await?;
                println!("  imported: {}", summary);
            }
            println!("ok");
        }
        Commands::Repo { action } => run_repo(&cfg, action, reporter.as_ref()).await?,
    }

    Ok(())
}

async fn run_repo(cfg: &Config, action: RepoAction, reporter: &dyn ProgressReporter) -> Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::migrate_pool(&pool).await?;
    let registry = RepoRegistry::new(pool.clone(), cfg.clone())?;

    match action {
        RepoAction::AddLocal { path, copy } => {
            let entry = registry.add_local(&path, copy).await?;
            println!("added local {}", entry.scan_path);
            if let Some(mirror) = &entry.storage_path {
                println!("  mirror: {}", mirror);
            }
        }
        RepoAction::AddRemote { url } => {
            let entry = registry.add_remote(&url).await?;
            println!("cloned {}", entry.remote_url);
            println!("  into: {}", entry.storage_path);
        }
        RepoAction::List { filter } => {
            let entries = registry.list(filter).await?;
            if entries.is_empty() {
                println!("No repositories tracked.");
            }
            for entry in &entries {
                print_entry(entry);
            }
        }
        RepoAction::Update {
            remotes,
            locals,
            in_place,
        } => {
            let both = !remotes && !locals;
            let (mut ok, mut failed) = (0u64, 0u64);
            if remotes || both {
                let (o, f) = drain_updates(registry.update_all_remotes(), reporter).await?;
                ok += o;
                failed += f;
            }
            if locals || both {
                let (o, f) = drain_updates(registry.update_all_locals(in_place), reporter).await?;
                ok += o;
                failed += f;
            }
            println!("update");
            println!("  succeeded: {}", format_number(ok));
            println!("  failed: {}", format_number(failed));
        }
        RepoAction::RemoveLocal { path } => {
            registry.remove_local(&path).await?;
            println!("removed {}", path.display());
        }
        RepoAction::RemoveRemote { url } => {
            registry.remove_remote(&url).await?;
            println!("removed {}", url);
        }
        RepoAction::Import { path, cloned } => {
            let repo_type = if cloned {
                RepoType::GitCloned
            } else {
                RepoType::GitLocal
            };
            let record = registry.scan_repo(&path, repo_type).await?;
            println!("{}", record.summary());

            let importer = Importer::new(Arc::new(SqliteStore::new(pool.clone())));
            let summary = drain_import(importer.import_repo(record), reporter).await?;
            println!("  imported: {}", summary);
        }
    }

    pool.close().await;
    Ok(())
}

fn print_entry(entry: &RegistryEntry) {
    match entry {
        RegistryEntry::Local(e) => {
            println!("local   {}", e.scan_path);
            if let Some(mirror) = &e.storage_path {
                println!("        mirror: {}", mirror);
            }
            println!("        added: {}", e.added_at.format("%Y-%m-%d %H:%M:%S"));
        }
        RegistryEntry::Cloned(e) => {
            println!("cloned  {}", e.remote_url);
            println!("        path: {}", e.storage_path);
            println!("        added: {}", e.added_at.format("%Y-%m-%d %H:%M:%S"));
        }
    }
}

async fn open_importer(cfg: &Config) -> Result<Importer> {
    let pool = db::connect(cfg).await?;
    migrate::migrate_pool(&pool).await?;
    Ok(Importer::new(Arc::new(SqliteStore::new(pool))))
}

/// Render every event; returns the completion summary.
async fn drain_import(
    mut stream: EventStream<ImportEvent>,
    reporter: &dyn ProgressReporter,
) -> Result<String> {
    let mut summary = String::new();
    while let Some(item) = stream.next().await {
        let event = item?;
        reporter.import(&event);
        if event.status == ImportStatus::Completed {
            summary = event.message;
        }
    }
    Ok(summary)
}

/// Render every outcome; returns `(succeeded, failed)`.
async fn drain_updates(
    mut stream: EventStream<UpdateOutcome>,
    reporter: &dyn ProgressReporter,
) -> Result<(u64, u64)> {
    let (mut ok, mut failed) = (0, 0);
    while let Some(item) = stream.next().await {
        let outcome = item?;
        reporter.update(&outcome);
        if outcome.success {
            ok += 1;
        } else {
            failed += 1;
        }
    }
    Ok((ok, failed))
}
