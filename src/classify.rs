//! File classification and record population.
//!
//! [`Classifier::populate`] turns a path into a typed [`FileRecord`]:
//!
//! 1. Reject missing paths and anything that is not a regular file.
//! 2. Stream the bytes through SHA-256 on the blocking pool.
//! 3. Capture stat, path pieces, and a MIME type guessed from the name.
//! 4. Pick the kind from the extension tables, or sniff the first bytes
//!    when the extension is unknown.
//! 5. Build the kind's payload.
//!
//! Nothing here writes to disk.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::config::{Config, MediaConfig};
use crate::dbfile;
use crate::error::{CatalogError, Result};
use crate::media;
use file_catalog_core::formats::{extension_matches, kind_for_extension};
use file_catalog_core::path::PathDescriptor;
use file_catalog_core::record::{
    DataPayload, DirectoryRecord, FileKind, FilePayload, FileRecord, TextPayload,
};
use file_catalog_core::stat::StatSnapshot;

const HASH_CHUNK_SIZE: usize = 64 * 1024;
const SNIFF_SIZE: usize = 8 * 1024;
const FALLBACK_MIME: &str = "application/octet-stream";

/// Builds records from paths.
#[derive(Debug, Clone)]
pub struct Classifier {
    media: MediaConfig,
}

/// Kind-independent pieces of a file record.
struct BaseInfo {
    path: PathDescriptor,
    content_hash: String,
    stat: StatSnapshot,
    mime_type: String,
}

impl Classifier {
    pub fn new(config: &Config) -> Self {
        Self {
            media: config.media.clone(),
        }
    }

    /// Classify `path` by extension (or content) and build its record.
    pub async fn populate(&self, path: &Path) -> Result<FileRecord> {
        let base = self.base_info(path).await?;
        let kind = match kind_for_extension(&base.path.extension()) {
            Some(kind) => kind,
            None => {
                if sniff_text(path).await? {
                    FileKind::Text
                } else {
                    FileKind::Generic
                }
            }
        };
        self.build(path, base, kind).await
    }

    /// Build `path` as `kind`, failing if the extension is not in that
    /// kind's table.
    pub async fn populate_as(&self, path: &Path, kind: FileKind) -> Result<FileRecord> {
        let base = self.base_info(path).await?;
        let ext = base.path.extension();
        let accepted = extension_matches(kind, &ext)
            || (kind == FileKind::Text && kind_for_extension(&ext).is_none() && sniff_text(path).await?);
        if !accepted {
            return Err(CatalogError::UnsupportedType {
                path: path.to_path_buf(),
                kind,
            });
        }
        self.build(path, base, kind).await
    }

    async fn base_info(&self, path: &Path) -> Result<BaseInfo> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(CatalogError::not_found(path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::not_found(path))
            }
            Err(e) => return Err(e.into()),
        };
        let absolute = std::path::absolute(path)?;
        let content_hash = hash_file(&absolute).await?;
        let mime_type = mime_guess::from_path(&absolute)
            .first_raw()
            .unwrap_or(FALLBACK_MIME)
            .to_string();

        Ok(BaseInfo {
            path: PathDescriptor::from_path(&absolute),
            content_hash,
            stat: StatSnapshot::from_metadata(&meta),
            mime_type,
        })
    }

    async fn build(&self, path: &Path, base: BaseInfo, kind: FileKind) -> Result<FileRecord> {
        debug!(path = %path.display(), %kind, "populating");
        let payload = match kind {
            FileKind::Generic => FilePayload::Generic,
            FileKind::Text => {
                let bytes = tokio::fs::read(path).await?;
                FilePayload::Text(TextPayload::from_content(&String::from_utf8_lossy(&bytes)))
            }
            FileKind::Data => {
                let bytes = tokio::fs::read(path).await?;
                FilePayload::Data(DataPayload {
                    content: String::from_utf8_lossy(&bytes).replace('\0', ""),
                })
            }
            FileKind::Image => {
                FilePayload::Image(media::read_image(path, self.media.thumbnail_size).await?)
            }
            FileKind::Video => FilePayload::Video(media::read_video(&self.media.ffprobe, path).await),
            FileKind::Audio => FilePayload::Audio(media::read_audio(&self.media.ffprobe, path).await),
            FileKind::Database => FilePayload::Database(dbfile::inspect(path).await?),
        };

        Ok(FileRecord::new(
            base.path,
            base.content_hash,
            base.stat,
            base.mime_type,
            payload,
        ))
    }

    /// Directory record with direct child counts.
    pub async fn populate_directory(&self, path: &Path) -> Result<DirectoryRecord> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => meta,
            Ok(_) => return Err(CatalogError::not_found(path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::not_found(path))
            }
            Err(e) => return Err(e.into()),
        };
        let absolute = std::path::absolute(path)?;

        let mut file_count = 0;
        let mut dir_count = 0;
        let mut entries = tokio::fs::read_dir(&absolute).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                dir_count += 1;
            } else {
                file_count += 1;
            }
        }

        Ok(DirectoryRecord::new(
            PathDescriptor::from_path(&absolute),
            StatSnapshot::from_metadata(&meta),
            file_count,
            dir_count,
        ))
    }
}

/// Records that can be built from a path.
#[async_trait]
pub trait Populate: Sized {
    async fn populate(classifier: &Classifier, path: &Path) -> Result<Self>;
}

#[async_trait]
impl Populate for FileRecord {
    async fn populate(classifier: &Classifier, path: &Path) -> Result<Self> {
        classifier.populate(path).await
    }
}

#[async_trait]
impl Populate for DirectoryRecord {
    async fn populate(classifier: &Classifier, path: &Path) -> Result<Self> {
        classifier.populate_directory(path).await
    }
}

/// Streaming SHA-256 of a file, hex-encoded.
pub async fn hash_file(path: &Path) -> Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<String> {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(|e| CatalogError::Io(std::io::Error::other(e)))?
}

/// Heuristic: the first bytes contain no NUL and are valid UTF-8 (a
/// multi-byte character cut at the sniff boundary still counts).
async fn sniff_text(path: &Path) -> Result<bool> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<bool> {
        let file = std::fs::File::open(&path)?;
        let mut buf = Vec::with_capacity(SNIFF_SIZE);
        file.take(SNIFF_SIZE as u64).read_to_end(&mut buf)?;
        if buf.contains(&0) {
            return Ok(false);
        }
        Ok(match std::str::from_utf8(&buf) {
            Ok(_) => true,
            Err(e) => e.error_len().is_none(),
        })
    })
    .await
    .map_err(|e| CatalogError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use file_catalog_core::sha256_hex;
    use tempfile::TempDir;

    fn classifier(tmp: &TempDir) -> Classifier {
        Classifier::new(&Config::new(
            tmp.path().join("db.sqlite"),
            tmp.path().join("repos"),
        ))
    }

    #[tokio::test]
    async fn test_hash_matches_one_shot_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.bin");
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &bytes).unwrap();
        assert_eq!(hash_file(&path).await.unwrap(), sha256_hex(&bytes));
    }

    #[tokio::test]
    async fn test_populate_markdown_as_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("note.md");
        std::fs::write(&path, "# Title\n\nBody").unwrap();

        let rec = classifier(&tmp).populate(&path).await.unwrap();
        assert_eq!(rec.kind(), FileKind::Text);
        assert!(rec.mime_type().starts_with("text/"));
        assert_eq!(rec.lines().unwrap().len(), 3);
        assert_eq!(rec.content_hash(), sha256_hex("# Title\n\nBody"));
        assert!(rec.path().is_absolute);
        assert_eq!(rec.stat().size, 14);
    }

    #[tokio::test]
    async fn test_unknown_extension_is_sniffed() {
        let tmp = TempDir::new().unwrap();
        let text = tmp.path().join("README");
        let binary = tmp.path().join("blob.zzq");
        std::fs::write(&text, "plain words").unwrap();
        std::fs::write(&binary, [0u8, 159, 146, 150]).unwrap();

        let c = classifier(&tmp);
        assert_eq!(c.populate(&text).await.unwrap().kind(), FileKind::Text);
        let rec = c.populate(&binary).await.unwrap();
        assert_eq!(rec.kind(), FileKind::Generic);
        assert_eq!(rec.mime_type(), FALLBACK_MIME);
    }

    #[tokio::test]
    async fn test_data_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rows.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();
        let rec = classifier(&tmp).populate(&path).await.unwrap();
        assert_eq!(rec.kind(), FileKind::Data);
        assert_eq!(rec.text(), Some("a,b\n1,2\n"));
    }

    #[tokio::test]
    async fn test_missing_and_directory_are_not_found() {
        let tmp = TempDir::new().unwrap();
        let c = classifier(&tmp);
        assert!(matches!(
            c.populate(&tmp.path().join("nope.md")).await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            c.populate(tmp.path()).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_populate_as_rejects_wrong_kind() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("note.md");
        std::fs::write(&path, "hello").unwrap();
        let c = classifier(&tmp);

        assert!(matches!(
            c.populate_as(&path, FileKind::Image).await,
            Err(CatalogError::UnsupportedType { kind: FileKind::Image, .. })
        ));
        assert_eq!(
            c.populate_as(&path, FileKind::Generic).await.unwrap().kind(),
            FileKind::Generic
        );
        assert_eq!(
            c.populate_as(&path, FileKind::Text).await.unwrap().kind(),
            FileKind::Text
        );
    }

    #[tokio::test]
    async fn test_directory_counts() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("d");
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("a.txt"), "a").unwrap();

        let rec = DirectoryRecord::populate(&classifier(&tmp), &dir).await.unwrap();
        assert_eq!(rec.file_count, 1);
        assert_eq!(rec.dir_count, 1);
        assert!(!rec.is_empty());
    }
}
