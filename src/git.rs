//! Git working-tree inspection and remote operations via the `git` CLI.
//!
//! Metadata extraction never fails: anything unexpected (no `.git`, git not
//! installed, corrupt repository) yields `None`.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use file_catalog_core::repo::{GitCommit, GitMetadata, DETACHED_HEAD};

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';

fn git(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .kill_on_drop(true);
    cmd
}

async fn run(dir: &Path, args: &[&str]) -> Result<String> {
    let output = git(dir)
        .args(args)
        .output()
        .await
        .with_context(|| "Failed to execute git. Is git installed?")?;
    check(&output, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn check(output: &Output, args: &[&str]) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(())
}

/// Returns `true` if the directory contains a `.git` entry.
pub fn is_git_repo(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Read repository state. `None` when `repo_path` is not a git working tree
/// or anything goes wrong along the way.
pub async fn extract_metadata(repo_path: &Path, history_depth: usize) -> Option<GitMetadata> {
    if !repo_path.is_dir() || !is_git_repo(repo_path) {
        return None;
    }
    match read_metadata(repo_path, history_depth).await {
        Ok(meta) => Some(meta),
        Err(e) => {
            debug!(path = %repo_path.display(), error = %e, "git metadata unavailable");
            None
        }
    }
}

async fn read_metadata(dir: &Path, history_depth: usize) -> Result<GitMetadata> {
    let remotes = parse_remotes(&run(dir, &["remote", "-v"]).await?);

    let current_branch = match run(dir, &["symbolic-ref", "--short", "-q", "HEAD"]).await {
        Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
        _ => DETACHED_HEAD.to_string(),
    };

    let branches = run(dir, &["for-each-ref", "--format=%(refname:short)", "refs/heads"])
        .await?
        .lines()
        .map(str::to_string)
        .collect();

    let has_commits = git(dir)
        .args(["rev-parse", "--verify", "-q", "HEAD"])
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false);

    let commit_history = if has_commits {
        let depth = format!("-n{}", history_depth);
        let format = "--format=%H%x1f%an <%ae>%x1f%aI%x1f%B%x1e";
        parse_log(&run(dir, &["log", &depth, format]).await?)
    } else {
        Vec::new()
    };

    let status = run(dir, &["status", "--porcelain", "--untracked-files=all"]).await?;
    let (uncommitted_changes, untracked_files) = parse_status(&status);

    Ok(GitMetadata {
        remotes,
        current_branch,
        branches,
        latest_commit: commit_history.first().cloned(),
        uncommitted_changes,
        untracked_files,
        commit_history,
    })
}

/// `git remote -v` output to name → fetch URL.
pub fn parse_remotes(out: &str) -> BTreeMap<String, String> {
    let mut remotes = BTreeMap::new();
    for line in out.lines() {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
            continue;
        };
        if parts.next() == Some("(push)") && remotes.contains_key(name) {
            continue;
        }
        remotes.insert(name.to_string(), url.to_string());
    }
    remotes
}

/// Parse `git log` output written with unit/record separators.
pub fn parse_log(out: &str) -> Vec<GitCommit> {
    out.split(RECORD_SEP)
        .filter_map(|record| {
            let record = record.trim_start_matches('\n');
            if record.trim().is_empty() {
                return None;
            }
            let mut fields = record.splitn(4, FIELD_SEP);
            let hash = fields.next()?;
            let author = fields.next()?;
            let date = fields.next()?;
            let message = fields.next().unwrap_or("");
            Some(GitCommit {
                hash: hash.chars().take(8).collect(),
                message: message.trim().to_string(),
                author: author.to_string(),
                date: date.to_string(),
            })
        })
        .collect()
}

/// `(dirty, untracked count)` from porcelain status. Untracked files alone
/// do not make the tree dirty.
pub fn parse_status(out: &str) -> (bool, u32) {
    let mut dirty = false;
    let mut untracked = 0;
    for line in out.lines().filter(|l| !l.is_empty()) {
        if line.starts_with("??") {
            untracked += 1;
        } else {
            dirty = true;
        }
    }
    (dirty, untracked)
}

/// Returns `true` if the working tree has uncommitted changes to tracked files.
pub async fn is_dirty(dir: &Path) -> Result<bool> {
    let status = run(dir, &["status", "--porcelain", "--untracked-files=no"]).await?;
    Ok(!status.trim().is_empty())
}

/// `https://host/org/name.git` → `name`.
pub fn repo_name_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(url)
        .trim_end_matches(".git")
        .to_string()
}

/// Clone `url` into `dest` (which must not exist), killing git after
/// `timeout`.
pub async fn clone(url: &str, dest: &Path, timeout: Duration) -> Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create parent directory: {}", parent.display()))?;

    let dest_str = dest.to_string_lossy().to_string();
    let args = ["clone", "--quiet", url, dest_str.as_str()];
    let output = tokio::time::timeout(timeout, git(parent).args(args).output())
        .await
        .with_context(|| format!("git clone timed out after {}s", timeout.as_secs()))?
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;
    check(&output, &args)
}

/// Fast-forward pull. Refuses to touch a tree with uncommitted changes.
pub async fn pull(dir: &Path, timeout: Duration) -> Result<()> {
    if !is_git_repo(dir) {
        bail!("Not a git repository: {}", dir.display());
    }
    if is_dirty(dir).await? {
        warn!(path = %dir.display(), "uncommitted changes, skipping pull");
        bail!("uncommitted changes in {}", dir.display());
    }

    let args = ["pull", "--ff-only", "--quiet"];
    let output = tokio::time::timeout(timeout, git(dir).args(args).output())
        .await
        .with_context(|| format!("git pull timed out after {}s", timeout.as_secs()))?
        .with_context(|| "Failed to execute 'git pull'")?;
    check(&output, &args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remotes_prefers_fetch() {
        let out = "origin\thttps://example.com/a.git (fetch)\norigin\tgit@example.com:a.git (push)\nupstream\thttps://example.com/up.git (fetch)\nupstream\thttps://example.com/up.git (push)\n";
        let remotes = parse_remotes(out);
        assert_eq!(remotes.len(), 2);
        assert_eq!(remotes["origin"], "https://example.com/a.git");
    }

    #[test]
    fn test_parse_log() {
        let out = "0123456789abcdef\x1fAda <ada@example.com>\x1f2024-05-01T10:00:00+02:00\x1fFix parser\n\nLonger body.\n\x1e\nfedcba9876543210\x1fBob <bob@example.com>\x1f2024-04-30T09:00:00+00:00\x1fInitial commit\n\x1e\n";
        let commits = parse_log(out);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].hash, "01234567");
        assert_eq!(commits[0].message, "Fix parser\n\nLonger body.");
        assert_eq!(commits[0].author, "Ada <ada@example.com>");
        assert_eq!(commits[1].date, "2024-04-30T09:00:00+00:00");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(""), (false, 0));
        assert_eq!(parse_status("?? new.txt\n?? other.txt\n"), (false, 2));
        assert_eq!(parse_status(" M src/lib.rs\n?? new.txt\n"), (true, 1));
    }

    #[test]
    fn test_repo_name_from_url() {
        assert_eq!(repo_name_from_url("https://github.com/org/widget.git"), "widget");
        assert_eq!(repo_name_from_url("https://github.com/org/widget/"), "widget");
        assert_eq!(repo_name_from_url("git@github.com:widget.git"), "widget");
        assert_eq!(repo_name_from_url("/srv/git/tools"), "tools");
    }

    #[tokio::test]
    async fn test_plain_directory_has_no_metadata() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(extract_metadata(tmp.path(), 10).await.is_none());
        assert!(extract_metadata(&tmp.path().join("missing"), 10).await.is_none());
    }
}
