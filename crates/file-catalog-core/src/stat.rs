//! Point-in-time file-system metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::time::SystemTime;

/// File-system metadata captured when a record is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatSnapshot {
    pub size: u64,
    /// Permission bits (`st_mode` on Unix; synthesized elsewhere).
    pub mode: u32,
    pub readonly: bool,
    pub accessed: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// Inode change time. Unix only.
    pub changed: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub platform: PlatformStat,
}

/// Platform-specific stat fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PlatformStat {
    Unix {
        ino: u64,
        dev: u64,
        nlink: u64,
        uid: u32,
        gid: u32,
        rdev: u64,
        blksize: u64,
        blocks: u64,
    },
    Windows {
        file_attributes: u32,
    },
    Other,
}

impl StatSnapshot {
    pub fn from_metadata(meta: &Metadata) -> Self {
        let readonly = meta.permissions().readonly();
        Self {
            size: meta.len(),
            mode: mode_bits(meta),
            readonly,
            accessed: meta.accessed().ok().map(to_utc),
            modified: meta.modified().ok().map(to_utc),
            changed: changed_time(meta),
            created: meta.created().ok().map(to_utc),
            platform: platform_stat(meta),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & 0o170000 == 0o040000
    }
}

fn to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

#[cfg(unix)]
fn mode_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.mode()
}

#[cfg(not(unix))]
fn mode_bits(meta: &Metadata) -> u32 {
    let kind = if meta.is_dir() { 0o040000 } else { 0o100000 };
    let perms = if meta.permissions().readonly() {
        0o444
    } else {
        0o666
    };
    kind | perms
}

#[cfg(unix)]
fn changed_time(meta: &Metadata) -> Option<DateTime<Utc>> {
    use std::os::unix::fs::MetadataExt;
    DateTime::from_timestamp(meta.ctime(), meta.ctime_nsec().clamp(0, 999_999_999) as u32)
}

#[cfg(not(unix))]
fn changed_time(_meta: &Metadata) -> Option<DateTime<Utc>> {
    None
}

#[cfg(unix)]
fn platform_stat(meta: &Metadata) -> PlatformStat {
    use std::os::unix::fs::MetadataExt;
    PlatformStat::Unix {
        ino: meta.ino(),
        dev: meta.dev(),
        nlink: meta.nlink(),
        uid: meta.uid(),
        gid: meta.gid(),
        rdev: meta.rdev(),
        blksize: meta.blksize(),
        blocks: meta.blocks(),
    }
}

#[cfg(windows)]
fn platform_stat(meta: &Metadata) -> PlatformStat {
    use std::os::windows::fs::MetadataExt;
    PlatformStat::Windows {
        file_attributes: meta.file_attributes(),
    }
}

#[cfg(not(any(unix, windows)))]
fn platform_stat(_meta: &Metadata) -> PlatformStat {
    PlatformStat::Other
}
