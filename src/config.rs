use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Managed repository storage. Clones land in `remotes/`, copied
    /// local trees in `locals/`.
    pub root: PathBuf,
}

impl StorageConfig {
    pub fn remotes_dir(&self) -> PathBuf {
        self.root.join("remotes")
    }

    pub fn locals_dir(&self) -> PathBuf {
        self.root.join("locals")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Extra directory/file names (or single-component globs) to skip.
    #[serde(default)]
    pub extra_ignore_parts: Vec<String>,
    /// Extra file-name endings to skip.
    #[serde(default)]
    pub extra_ignore_extensions: Vec<String>,
    /// Globs matched against root-relative paths, as in `docs/drafts/**`.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            follow_symlinks: false,
            extra_ignore_parts: Vec::new(),
            extra_ignore_extensions: Vec::new(),
            exclude_globs: Vec::new(),
            timeout_secs: None,
        }
    }
}

fn default_workers() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitConfig {
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
    #[serde(default = "default_git_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            history_depth: default_history_depth(),
            timeout_secs: default_git_timeout_secs(),
        }
    }
}

fn default_history_depth() -> usize {
    10
}
fn default_git_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: default_thumbnail_size(),
            ffprobe: default_ffprobe(),
        }
    }
}

fn default_thumbnail_size() -> u32 {
    512
}
fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Config {
    /// Defaults everywhere except the two required paths.
    pub fn new(db_path: impl Into<PathBuf>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            storage: StorageConfig {
                root: storage_root.into(),
            },
            scan: ScanConfig::default(),
            git: GitConfig::default(),
            media: MediaConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.workers == 0 {
            anyhow::bail!("scan.workers must be >= 1");
        }
        if self.scan.timeout_secs == Some(0) {
            anyhow::bail!("scan.timeout_secs must be >= 1 when set");
        }
        if self.git.history_depth == 0 {
            anyhow::bail!("git.history_depth must be >= 1");
        }
        if self.git.timeout_secs == 0 {
            anyhow::bail!("git.timeout_secs must be >= 1");
        }
        if self.media.thumbnail_size < 16 {
            anyhow::bail!("media.thumbnail_size must be >= 16");
        }
        for pattern in &self.scan.exclude_globs {
            globset::Glob::new(pattern)
                .with_context(|| format!("Invalid scan.exclude_globs pattern: '{}'", pattern))?;
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
