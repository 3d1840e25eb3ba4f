//! # File Catalog Core
//!
//! Shared, I/O-free logic for File Catalog: the record model with its
//! identity derivation, the file-format and ignore tables, Obsidian note
//! parsing, and the storage abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem walking, or process
//! spawning. Everything here operates on values handed to it by the
//! `file-catalog` crate.

pub mod event;
pub mod formats;
pub mod path;
pub mod record;
pub mod registry;
pub mod repo;
pub mod scan;
pub mod stat;
pub mod store;
pub mod tags;
pub mod vault;

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `bytes`.
pub fn sha256_hex(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(bytes.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
