//! Git repository records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::formats::DOC_EXTENSIONS;
use crate::record::{DirectoryRecord, FileRecord, Summarize};

/// Sentinel branch name for a detached HEAD.
pub const DETACHED_HEAD: &str = "HEAD (detached)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCommit {
    /// First 8 hex characters of the commit hash.
    pub hash: String,
    pub message: String,
    /// `Name <email>`.
    pub author: String,
    /// ISO-8601 with offset.
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitMetadata {
    pub remotes: BTreeMap<String, String>,
    pub current_branch: String,
    pub branches: Vec<String>,
    /// `None` for a repository without commits.
    pub latest_commit: Option<GitCommit>,
    pub uncommitted_changes: bool,
    pub untracked_files: u32,
    /// Most recent first.
    pub commit_history: Vec<GitCommit>,
}

impl GitMetadata {
    pub fn origin(&self) -> Option<&str> {
        self.remotes.get("origin").map(String::as_str)
    }

    pub fn is_detached(&self) -> bool {
        self.current_branch == DETACHED_HEAD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepoType {
    GitLocal,
    GitCloned,
}

impl RepoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::GitLocal => "git-local",
            RepoType::GitCloned => "git-cloned",
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git-local" => Ok(RepoType::GitLocal),
            "git-cloned" => Ok(RepoType::GitCloned),
            other => anyhow::bail!("Unknown repo type: '{}'", other),
        }
    }
}

/// A file inside a repository, with its repo-relative path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoFile {
    /// `/`-separated path relative to the repository root.
    pub repo_path: String,
    pub record: FileRecord,
}

/// A repository snapshot: directory, git state, and cataloged files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRecord {
    pub directory: DirectoryRecord,
    pub repo_type: RepoType,
    pub url: Option<String>,
    /// `None` when the directory is not a git working tree.
    pub git_metadata: Option<GitMetadata>,
    pub last_seen: DateTime<Utc>,
    pub files: Vec<RepoFile>,
}

impl RepoRecord {
    pub fn id(&self) -> &str {
        self.directory.id()
    }

    pub fn name(&self) -> &str {
        &self.directory.path().name
    }

    /// Documentation files (`.md`, `.rst`, `.txt`).
    pub fn docs(&self) -> impl Iterator<Item = &RepoFile> {
        self.files
            .iter()
            .filter(|f| DOC_EXTENSIONS.contains(&f.record.path().extension().as_str()))
    }

    pub fn commits(&self) -> &[GitCommit] {
        self.git_metadata
            .as_ref()
            .map(|m| m.commit_history.as_slice())
            .unwrap_or(&[])
    }
}

impl Summarize for RepoRecord {
    fn summary(&self) -> String {
        let branch = self
            .git_metadata
            .as_ref()
            .map(|m| m.current_branch.as_str())
            .unwrap_or("no git");
        format!(
            "[{}] {} ({}, {} files)",
            self.repo_type,
            self.directory.path().full,
            branch,
            self.files.len()
        )
    }
}
