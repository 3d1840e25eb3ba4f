//! # File Catalog
//!
//! A local file-system content indexer.
//!
//! File Catalog walks directory trees, classifies every file by kind (text,
//! image, video, audio, data, database, generic), extracts kind-specific
//! content and metadata, snapshots Git repositories and Obsidian vaults, and
//! persists everything into a SQLite catalog. Records are content-addressed,
//! so re-running a scan over an unchanged tree writes nothing new.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │   Scanner   │──▶│ Classifier  │──▶│   Importer   │──▶│  SQLite  │
//! │ walk+ignore │   │ hash+kinds  │   │ event stream │   │ per kind │
//! └──────┬──────┘   └─────────────┘   └──────────────┘   └──────────┘
//!        │
//!   ┌────┴─────┐      ┌──────────┐
//!   │ Registry │─────▶│ git CLI  │
//!   │ repos    │      │ clone... │
//!   └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! fcat init                              # create database
//! fcat scan ~/Documents --import         # catalog a tree
//! fcat vault ~/Notes --import            # catalog an Obsidian vault
//! fcat repo add-remote https://example.com/org/tool.git
//! fcat repo import ./data/repos/remotes/tool --cloned
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`classify`] | Path → typed record |
//! | [`media`] | Image decoding, EXIF, `ffprobe` |
//! | [`dbfile`] | SQLite file inspection |
//! | [`scanner`] | Recursive tree scanning |
//! | [`git`] | Git metadata, clone, pull |
//! | [`registry`] | Tracked local and cloned repositories |
//! | [`vault`] | Obsidian vault scanning |
//! | [`importer`] | Streaming upsert into a store |
//! | [`sqlite_store`] | SQLite catalog store |
//! | [`stream`] | Event streams |
//! | [`progress`] | Progress rendering |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Error type |
//! | [`logging`] | Tracing setup |

pub mod classify;
pub mod config;
pub mod db;
pub mod dbfile;
pub mod error;
pub mod git;
pub mod importer;
pub mod logging;
pub mod media;
pub mod migrate;
pub mod progress;
pub mod registry;
pub mod scanner;
pub mod sqlite_store;
pub mod stream;
pub mod vault;

pub use error::{CatalogError, Result};
