use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use file_catalog::config::Config;
use file_catalog::registry::RepoRegistry;
use file_catalog::{db, git, migrate, CatalogError};
use file_catalog_core::registry::{RegistryEntry, RepoFilter};
use file_catalog_core::repo::RepoType;

async fn registry(tmp: &TempDir) -> (RepoRegistry, Config) {
    let config = Config::new(tmp.path().join("catalog.sqlite"), tmp.path().join("storage"));
    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    (RepoRegistry::new(pool, config.clone()).unwrap(), config)
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn run_git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .current_dir(dir)
        .args(args)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// A repository with one commit on `main` and an `origin` remote.
fn init_repo(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    run_git(dir, &["init", "-q", "-b", "main"]);
    fs::write(dir.join("README.md"), "# Demo\n\nHello\n").unwrap();
    run_git(dir, &["add", "."]);
    run_git(dir, &["commit", "-q", "-m", "Initial commit"]);
    run_git(
        dir,
        &["remote", "add", "origin", "https://example.com/org/demo.git"],
    );
}

#[tokio::test]
async fn add_local_twice_is_already_exists() {
    let tmp = TempDir::new().unwrap();
    let (registry, _) = registry(&tmp).await;
    let project = tmp.path().join("project");
    fs::create_dir_all(&project).unwrap();

    registry.add_local(&project, false).await.unwrap();
    let again = registry.add_local(&project, false).await;
    assert!(matches!(again, Err(CatalogError::AlreadyExists(_))));

    let entries = registry.list(RepoFilter::All).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn add_local_missing_path_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let (registry, _) = registry(&tmp).await;
    let result = registry.add_local(&tmp.path().join("nope"), false).await;
    assert!(matches!(result, Err(CatalogError::NotFound(_))));
}

#[tokio::test]
async fn add_local_with_copy_mirrors_the_tree() {
    let tmp = TempDir::new().unwrap();
    let (registry, config) = registry(&tmp).await;
    let project = tmp.path().join("project");
    fs::create_dir_all(project.join("src")).unwrap();
    fs::write(project.join("src/lib.rs"), "pub fn f() {}\n").unwrap();

    let entry = registry.add_local(&project, true).await.unwrap();
    let mirror = fs::canonicalize(config.storage.locals_dir())
        .unwrap()
        .join("project");
    assert_eq!(entry.storage_path.as_deref(), Some(mirror.to_str().unwrap()));
    assert!(mirror.join("src/lib.rs").exists());
    assert_eq!(entry.effective_path(), mirror.to_str().unwrap());
}

#[tokio::test]
async fn copy_skips_storage_nested_in_the_tree() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("proj");
    fs::create_dir_all(project.join("src")).unwrap();
    fs::write(project.join("src/main.rs"), "fn main() {}\n").unwrap();

    let config = Config::new(tmp.path().join("catalog.sqlite"), project.join("data/repos"));
    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    let registry = RepoRegistry::new(pool, config).unwrap();

    let entry = registry.add_local(&project, true).await.unwrap();
    let mirror = Path::new(entry.storage_path.as_deref().unwrap()).to_path_buf();
    assert!(mirror.join("src/main.rs").exists());
    assert!(!mirror.join("data/repos").exists());
}

#[tokio::test]
async fn add_remote_onto_existing_target_is_already_exists() {
    let tmp = TempDir::new().unwrap();
    let (registry, config) = registry(&tmp).await;
    let target = config.storage.remotes_dir().join("demo");
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("keep.txt"), "mine").unwrap();

    let result = registry
        .add_remote("https://example.com/org/demo.git")
        .await;
    assert!(matches!(result, Err(CatalogError::AlreadyExists(_))));
    assert_eq!(fs::read_to_string(target.join("keep.txt")).unwrap(), "mine");
}

#[tokio::test]
async fn failed_clone_is_cloning_error_and_leaves_nothing() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let (registry, config) = registry(&tmp).await;
    let url = tmp.path().join("no-such-repo").to_string_lossy().to_string();

    let result = registry.add_remote(&url).await;
    assert!(matches!(result, Err(CatalogError::Cloning { .. })));
    assert!(!config.storage.remotes_dir().join("no-such-repo").exists());
    assert!(registry.get_remote(&url).await.unwrap().is_none());
}

#[tokio::test]
async fn remove_keeps_files_on_disk() {
    let tmp = TempDir::new().unwrap();
    let (registry, _) = registry(&tmp).await;
    let project = tmp.path().join("project");
    fs::create_dir_all(&project).unwrap();

    registry.add_local(&project, false).await.unwrap();
    registry.remove_local(&project).await.unwrap();
    assert!(project.exists());
    assert!(registry.list(RepoFilter::Local).await.unwrap().is_empty());

    let again = registry.remove_local(&project).await;
    assert!(matches!(again, Err(CatalogError::NotFound(_))));
    let remote = registry.remove_remote("https://example.com/x.git").await;
    assert!(matches!(remote, Err(CatalogError::NotFound(_))));
}

#[tokio::test]
async fn plain_directory_has_no_git_metadata() {
    let tmp = TempDir::new().unwrap();
    let (registry, _) = registry(&tmp).await;
    let project = tmp.path().join("plain");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("notes.md"), "hi").unwrap();

    let repo = registry
        .scan_repo(&project, RepoType::GitLocal)
        .await
        .unwrap();
    assert!(repo.git_metadata.is_none());
    assert!(repo.url.is_none());
    assert_eq!(repo.files.len(), 1);
    assert_eq!(repo.files[0].repo_path, "notes.md");
}

#[tokio::test]
async fn git_repository_metadata_is_extracted() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let (registry, _) = registry(&tmp).await;
    let project = tmp.path().join("demo");
    init_repo(&project);
    fs::write(project.join("untracked.txt"), "new").unwrap();

    let repo = registry
        .scan_repo(&project, RepoType::GitLocal)
        .await
        .unwrap();
    let meta = repo.git_metadata.as_ref().unwrap();
    assert_eq!(meta.current_branch, "main");
    assert_eq!(meta.branches, vec!["main"]);
    assert_eq!(meta.commit_history.len(), 1);
    assert_eq!(meta.latest_commit.as_ref().unwrap().message, "Initial commit");
    assert!(!meta.uncommitted_changes);
    assert_eq!(meta.untracked_files, 1);
    assert_eq!(repo.url.as_deref(), Some("https://example.com/org/demo.git"));

    // .git is never cataloged
    let paths: Vec<&str> = repo.files.iter().map(|f| f.repo_path.as_str()).collect();
    assert_eq!(paths, vec!["README.md", "untracked.txt"]);
}

#[tokio::test]
async fn repository_without_commits() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("empty");
    fs::create_dir_all(&project).unwrap();
    run_git(&project, &["init", "-q", "-b", "main"]);

    let meta = git::extract_metadata(&project, 10).await.unwrap();
    assert!(meta.latest_commit.is_none());
    assert!(meta.commit_history.is_empty());
    assert_eq!(meta.current_branch, "main");
}

#[tokio::test]
async fn clone_and_update_remote() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let (registry, config) = registry(&tmp).await;
    let upstream = tmp.path().join("upstream/demo");
    init_repo(&upstream);
    let url = upstream.to_string_lossy().to_string();

    let entry = registry.add_remote(&url).await.unwrap();
    assert_eq!(
        Path::new(&entry.storage_path),
        fs::canonicalize(config.storage.remotes_dir())
            .unwrap()
            .join("demo")
    );
    assert!(Path::new(&entry.storage_path).join("README.md").exists());

    fs::write(upstream.join("CHANGELOG.md"), "v2\n").unwrap();
    run_git(&upstream, &["add", "."]);
    run_git(&upstream, &["commit", "-q", "-m", "Add changelog"]);

    let outcomes = registry.update_all_remotes().try_collect().await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success, "{}", outcomes[0].message);
    assert!(Path::new(&entry.storage_path).join("CHANGELOG.md").exists());

    match &registry.list(RepoFilter::Cloned).await.unwrap()[0] {
        RegistryEntry::Cloned(e) => assert!(e.updated_at.is_some()),
        other => panic!("unexpected entry {:?}", other),
    }
}

#[tokio::test]
async fn update_locals_reports_non_git_failure() {
    let tmp = TempDir::new().unwrap();
    let (registry, _) = registry(&tmp).await;
    let project = tmp.path().join("plain");
    fs::create_dir_all(&project).unwrap();
    registry.add_local(&project, false).await.unwrap();

    let outcomes = registry.update_all_locals(true).try_collect().await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].success);
}

#[tokio::test]
async fn refresh_recopies_the_working_tree() {
    let tmp = TempDir::new().unwrap();
    let (registry, _) = registry(&tmp).await;
    let project = tmp.path().join("app.v2");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("old.txt"), "old").unwrap();
    let sibling = tmp.path().join("storage/locals/app.refresh");
    fs::create_dir_all(&sibling).unwrap();

    let entry = registry.add_local(&project, true).await.unwrap();
    let mirror = Path::new(entry.storage_path.as_deref().unwrap()).to_path_buf();
    fs::remove_file(project.join("old.txt")).unwrap();
    fs::write(project.join("new.txt"), "new").unwrap();

    let outcomes = registry.update_all_locals(false).try_collect().await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].success, "{}", outcomes[0].message);
    assert_eq!(outcomes[0].message, "mirror refreshed");
    assert!(mirror.join("new.txt").exists());
    assert!(!mirror.join("old.txt").exists());
    assert!(!tmp.path().join("storage/locals/app.v2.refresh").exists());
    assert!(sibling.exists());

    match &registry.list(RepoFilter::Local).await.unwrap()[0] {
        RegistryEntry::Local(e) => assert!(e.updated_at.is_some()),
        other => panic!("unexpected entry {:?}", other),
    }
}

#[tokio::test]
async fn one_failing_update_does_not_stop_the_others() {
    let tmp = TempDir::new().unwrap();
    let (registry, _) = registry(&tmp).await;
    let broken = tmp.path().join("a-plain");
    let mirrored = tmp.path().join("b-mirrored");
    fs::create_dir_all(&broken).unwrap();
    fs::create_dir_all(&mirrored).unwrap();
    fs::write(mirrored.join("file.txt"), "x").unwrap();

    registry.add_local(&broken, false).await.unwrap();
    registry.add_local(&mirrored, true).await.unwrap();

    let outcomes = registry.update_all_locals(false).try_collect().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].target.ends_with("a-plain"));
    assert!(!outcomes[0].success);
    assert!(outcomes[1].target.ends_with("b-mirrored"));
    assert!(outcomes[1].success, "{}", outcomes[1].message);
}
