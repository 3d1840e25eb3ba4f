//! Registry entries for tracked repositories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A local working tree being tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRepoEntry {
    pub id: String,
    /// Canonical path of the tracked working tree. Unique.
    pub scan_path: String,
    /// Managed mirror, when the tree was copied on registration.
    pub storage_path: Option<String>,
    pub added_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LocalRepoEntry {
    /// Directory to scan: the mirror if there is one, else the tree itself.
    pub fn effective_path(&self) -> &str {
        self.storage_path.as_deref().unwrap_or(&self.scan_path)
    }
}

/// A remote repository cloned into managed storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClonedRepoEntry {
    pub id: String,
    /// Unique.
    pub remote_url: String,
    pub storage_path: String,
    pub added_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RegistryEntry {
    Local(LocalRepoEntry),
    Cloned(ClonedRepoEntry),
}

impl RegistryEntry {
    pub fn id(&self) -> &str {
        match self {
            RegistryEntry::Local(e) => &e.id,
            RegistryEntry::Cloned(e) => &e.id,
        }
    }

    /// The path or URL the entry is keyed on.
    pub fn key(&self) -> &str {
        match self {
            RegistryEntry::Local(e) => &e.scan_path,
            RegistryEntry::Cloned(e) => &e.remote_url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoFilter {
    Local,
    Cloned,
    #[default]
    All,
}

impl RepoFilter {
    pub fn includes_local(&self) -> bool {
        matches!(self, RepoFilter::Local | RepoFilter::All)
    }

    pub fn includes_cloned(&self) -> bool {
        matches!(self, RepoFilter::Cloned | RepoFilter::All)
    }
}

impl FromStr for RepoFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(RepoFilter::Local),
            "cloned" => Ok(RepoFilter::Cloned),
            "all" => Ok(RepoFilter::All),
            other => anyhow::bail!("Unknown filter: '{}'. Available: local, cloned, all", other),
        }
    }
}

/// Outcome of refreshing one registered repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Path or URL of the entry.
    pub target: String,
    pub success: bool,
    pub message: String,
}
