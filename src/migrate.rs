//! Schema creation. Every statement is idempotent.
//!
//! Loose files live in one table per kind. Each carries generated
//! `filename`, `extension` and `size_bytes` columns derived from the stored
//! path/stat JSON so they can be indexed and queried without parsing JSON.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use file_catalog_core::record::FileKind;

/// Table holding loose files of `kind`.
pub fn file_table(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Generic => "generic_files",
        FileKind::Text => "text_files",
        FileKind::Image => "image_files",
        FileKind::Video => "video_files",
        FileKind::Data => "data_files",
        FileKind::Audio => "audio_files",
        FileKind::Database => "database_files",
    }
}

/// Kind-specific columns appended to the common file columns.
fn kind_columns(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Generic => "",
        FileKind::Text | FileKind::Data => "content TEXT NOT NULL,",
        FileKind::Image => {
            "format TEXT NOT NULL,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            nsfw INTEGER NOT NULL DEFAULT 0,
            exif_json TEXT NOT NULL DEFAULT '{}',
            thumbnail TEXT NOT NULL,"
        }
        FileKind::Video => {
            "duration REAL,
            resolution TEXT,
            codec TEXT,"
        }
        FileKind::Audio => {
            "duration REAL,
            transcript TEXT,
            video_id TEXT,"
        }
        FileKind::Database => {
            "schema_sql TEXT NOT NULL,
            tables_json TEXT NOT NULL DEFAULT '[]',"
        }
    }
}

const GENERATED_COLUMNS: &str = r#"
    filename TEXT GENERATED ALWAYS AS (json_extract(path_json, '$.name')) STORED,
    extension TEXT GENERATED ALWAYS AS (lower(json_extract(path_json, '$.suffix'))) STORED,
    size_bytes INTEGER GENERATED ALWAYS AS (json_extract(stat_json, '$.size')) STORED
"#;

/// Loose files are keyed by record ID alone. Repo files and notes are keyed
/// by parent plus record ID, since nested repos and vaults share files.
const LOOSE_KEY: &str = "id TEXT PRIMARY KEY,";
const NESTED_KEY: &str = "id TEXT NOT NULL,";

const COMMON_FILE_COLUMNS: &str = r#"
    content_hash TEXT NOT NULL,
    path_json TEXT NOT NULL,
    stat_json TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    short_description TEXT,
    long_description TEXT,
    frozen INTEGER NOT NULL DEFAULT 1,
    record_json TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
"#;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // Registry tables
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scan_roots (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            details TEXT NOT NULL DEFAULT '{}',
            added_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS local_repos (
            id TEXT PRIMARY KEY,
            scan_path TEXT NOT NULL UNIQUE,
            storage_path TEXT,
            added_at INTEGER NOT NULL,
            updated_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cloned_repos (
            id TEXT PRIMARY KEY,
            remote_url TEXT NOT NULL UNIQUE,
            storage_path TEXT NOT NULL,
            added_at INTEGER NOT NULL,
            updated_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Loose file tables, one per kind
    for kind in FileKind::ALL {
        let table = file_table(kind);
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} ({} {} {} {})",
            table,
            LOOSE_KEY,
            COMMON_FILE_COLUMNS,
            kind_columns(kind),
            GENERATED_COLUMNS
        ))
        .execute(pool)
        .await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_content_hash ON {0}(content_hash)",
            table
        ))
        .execute(pool)
        .await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_extension ON {0}(extension)",
            table
        ))
        .execute(pool)
        .await?;
    }

    // Repositories
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repos (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            repo_type TEXT NOT NULL,
            url TEXT,
            git_metadata TEXT,
            directory_json TEXT NOT NULL,
            last_seen INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS repo_files (
            {} {}
            repo_id TEXT NOT NULL,
            repo_path TEXT NOT NULL,
            kind TEXT NOT NULL,
            content TEXT,
            {},
            PRIMARY KEY (repo_id, id),
            FOREIGN KEY (repo_id) REFERENCES repos(id) ON DELETE CASCADE
        )
        "#,
        NESTED_KEY, COMMON_FILE_COLUMNS, GENERATED_COLUMNS
    ))
    .execute(pool)
    .await?;

    // Vaults
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vaults (
            id TEXT PRIMARY KEY,
            path TEXT NOT NULL UNIQUE,
            has_marker INTEGER NOT NULL,
            directory_json TEXT NOT NULL,
            last_seen INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS vault_notes (
            {} {}
            vault_id TEXT NOT NULL,
            vault_path TEXT NOT NULL,
            content TEXT NOT NULL,
            obsidian_tags TEXT NOT NULL DEFAULT '[]',
            links TEXT NOT NULL DEFAULT '[]',
            properties TEXT NOT NULL DEFAULT '{{}}',
            {},
            PRIMARY KEY (vault_id, id),
            FOREIGN KEY (vault_id) REFERENCES vaults(id) ON DELETE CASCADE
        )
        "#,
        NESTED_KEY, COMMON_FILE_COLUMNS, GENERATED_COLUMNS
    ))
    .execute(pool)
    .await?;

    // Line tables, one row per non-blank line
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS text_file_lines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            UNIQUE(file_id, line_number),
            FOREIGN KEY (file_id) REFERENCES text_files(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    for (table, parent, owner) in [
        ("repo_file_lines", "repo_files", "repo_id"),
        ("vault_note_lines", "vault_notes", "vault_id"),
    ] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {0} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                {2} TEXT NOT NULL,
                file_id TEXT NOT NULL,
                line_number INTEGER NOT NULL,
                content TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                UNIQUE({2}, file_id, line_number),
                FOREIGN KEY ({2}, file_id) REFERENCES {1}({2}, id) ON DELETE CASCADE
            )
            "#,
            table, parent, owner
        ))
        .execute(pool)
        .await?;
    }

    for table in ["text_file_lines", "repo_file_lines", "vault_note_lines"] {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_content_hash ON {0}(content_hash)",
            table
        ))
        .execute(pool)
        .await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_file_id ON {0}(file_id)",
            table
        ))
        .execute(pool)
        .await?;
    }

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_repo_files_repo_id ON repo_files(repo_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vault_notes_vault_id ON vault_notes(vault_id)")
        .execute(pool)
        .await?;

    // One view over every loose-file table for kind-agnostic lookups
    let union = FileKind::ALL
        .iter()
        .map(|k| {
            format!(
                "SELECT id, '{}' AS kind, created_at, updated_at FROM {}",
                k.as_str(),
                file_table(*k)
            )
        })
        .collect::<Vec<_>>()
        .join(" UNION ALL ");
    sqlx::query(&format!("CREATE VIEW IF NOT EXISTS all_files AS {}", union))
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config::new(tmp.path().join("catalog.sqlite"), tmp.path().join("repos"));
        run_migrations(&config).await.unwrap();
        run_migrations(&config).await.unwrap();

        let pool = db::connect(&config).await.unwrap();
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();
        for expected in [
            "cloned_repos",
            "image_files",
            "local_repos",
            "repo_file_lines",
            "repos",
            "scan_roots",
            "text_file_lines",
            "vault_note_lines",
            "vault_notes",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {}", expected);
        }
    }
}
