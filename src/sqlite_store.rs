//! SQLite implementation of [`CatalogStore`].
//!
//! Every write runs in its own transaction. Text-bearing inserts replace the
//! owner's line rows inside that same transaction, so a record and its lines
//! are always stored together or not at all.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::{SqlitePool, Transaction};
use std::str::FromStr;
use uuid::Uuid;

use crate::db::to_datetime;
use crate::migrate::file_table;
use file_catalog_core::record::{FileKind, FilePayload, FileRecord, LineRecord};
use file_catalog_core::repo::{RepoFile, RepoRecord};
use file_catalog_core::scan::ScanResult;
use file_catalog_core::store::{shreddable_lines, CatalogStore, StoredMeta};
use file_catalog_core::vault::{NoteRecord, VaultRecord};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;
type MetaRow = (String, i64, i64);

const LINE_TABLES: [&str; 3] = ["text_file_lines", "repo_file_lines", "vault_note_lines"];

/// A column value for dynamically built inserts.
enum Value {
    Text(Option<String>),
    Int(i64),
    Real(Option<f64>),
}

impl Value {
    fn text(s: impl Into<String>) -> Self {
        Value::Text(Some(s.into()))
    }

    fn bind<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        match self {
            Value::Text(v) => query.bind(v.as_deref()),
            Value::Int(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
        }
    }
}

type Columns = Vec<(&'static str, Value)>;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn find_meta(&self, sql: &str, binds: &[&str]) -> Result<Option<StoredMeta>> {
        let mut query = sqlx::query_as::<_, MetaRow>(sql);
        for b in binds {
            query = query.bind(*b);
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|(id, created_at, updated_at)| StoredMeta {
            id,
            created_at: to_datetime(created_at),
            updated_at: to_datetime(updated_at),
        }))
    }
}

/// Columns shared by every file-bearing table.
fn common_columns(record: &FileRecord, now: i64) -> Result<Columns> {
    Ok(vec![
        ("id", Value::text(record.id())),
        ("content_hash", Value::text(record.content_hash())),
        ("path_json", Value::text(serde_json::to_string(record.path())?)),
        ("stat_json", Value::text(serde_json::to_string(record.stat())?)),
        ("mime_type", Value::text(record.mime_type())),
        ("tags", Value::text(serde_json::to_string(&record.tags)?)),
        ("short_description", Value::Text(record.short_description.clone())),
        ("long_description", Value::Text(record.long_description.clone())),
        ("frozen", Value::Int(record.frozen as i64)),
        ("record_json", Value::text(serde_json::to_string(record)?)),
        ("created_at", Value::Int(now)),
        ("updated_at", Value::Int(now)),
    ])
}

/// Kind columns of the loose-file table for `payload`.
fn payload_columns(payload: &FilePayload) -> Result<Columns> {
    Ok(match payload {
        FilePayload::Generic => Vec::new(),
        FilePayload::Text(t) => vec![("content", Value::text(t.content.as_str()))],
        FilePayload::Data(d) => vec![("content", Value::text(d.content.as_str()))],
        FilePayload::Image(i) => vec![
            ("format", Value::text(i.format.as_str())),
            ("width", Value::Int(i.width as i64)),
            ("height", Value::Int(i.height as i64)),
            ("nsfw", Value::Int(i.nsfw as i64)),
            ("exif_json", Value::text(serde_json::to_string(&i.metadata)?)),
            ("thumbnail", Value::text(i.thumbnail.as_str())),
        ],
        FilePayload::Video(v) => vec![
            ("duration", Value::Real(v.duration)),
            ("resolution", Value::Text(v.resolution())),
            ("codec", Value::Text(v.codec.clone())),
        ],
        FilePayload::Audio(a) => vec![
            ("duration", Value::Real(a.duration)),
            ("transcript", Value::Text(a.transcript.clone())),
            ("video_id", Value::Text(a.video_id.clone())),
        ],
        FilePayload::Database(d) => vec![
            ("schema_sql", Value::text(d.schema.as_str())),
            ("tables_json", Value::text(serde_json::to_string(&d.tables)?)),
        ],
    })
}

async fn insert_row(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    columns: &Columns,
) -> Result<()> {
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        vec!["?"; names.len()].join(", ")
    );
    let mut query = sqlx::query(&sql);
    for (_, value) in columns {
        query = value.bind(query);
    }
    query
        .execute(&mut **tx)
        .await
        .with_context(|| format!("insert into {}", table))?;
    Ok(())
}

/// Parent scope of a line table row: `(column, parent_id)`.
type Owner<'a> = Option<(&'static str, &'a str)>;

/// Replace the record's line rows with its current non-blank lines.
async fn shred_lines(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    owner: Owner<'_>,
    record: &FileRecord,
) -> Result<()> {
    let (scope, insert) = match owner {
        Some((column, _)) => (
            format!(" AND {} = ?", column),
            format!(
                "INSERT INTO {} (file_id, line_number, content, content_hash, {}) VALUES (?, ?, ?, ?, ?)",
                table, column
            ),
        ),
        None => (
            String::new(),
            format!(
                "INSERT INTO {} (file_id, line_number, content, content_hash) VALUES (?, ?, ?, ?)",
                table
            ),
        ),
    };

    let delete = format!("DELETE FROM {} WHERE file_id = ?{}", table, scope);
    let mut query = sqlx::query(&delete).bind(record.id());
    if let Some((_, parent)) = owner {
        query = query.bind(parent);
    }
    query.execute(&mut **tx).await?;

    for line in shreddable_lines(record) {
        let mut query = sqlx::query(&insert)
            .bind(record.id())
            .bind(line.line_number as i64)
            .bind(&line.content)
            .bind(&line.hash);
        if let Some((_, parent)) = owner {
            query = query.bind(parent);
        }
        query.execute(&mut **tx).await?;
    }
    Ok(())
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn find_file(&self, id: &str) -> Result<Option<StoredMeta>> {
        self.find_meta(
            "SELECT id, created_at, updated_at FROM all_files WHERE id = ?",
            &[id],
        )
        .await
    }

    async fn insert_file(&self, record: &FileRecord) -> Result<()> {
        let now = Utc::now().timestamp();
        let mut columns = common_columns(record, now)?;
        columns.extend(payload_columns(record.payload())?);

        let mut tx = self.pool.begin().await?;
        insert_row(&mut tx, file_table(record.kind()), &columns).await?;
        if record.kind() == FileKind::Text {
            shred_lines(&mut tx, "text_file_lines", None, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_file(&self, id: &str) -> Result<Option<FileRecord>> {
        let kind: Option<String> = sqlx::query_scalar("SELECT kind FROM all_files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(kind) = kind else {
            return Ok(None);
        };
        let kind = FileKind::from_str(&kind)?;

        let json: String = sqlx::query_scalar(&format!(
            "SELECT record_json FROM {} WHERE id = ?",
            file_table(kind)
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn find_repo(&self, id: &str) -> Result<Option<StoredMeta>> {
        self.find_meta(
            "SELECT id, created_at, updated_at FROM repos WHERE id = ?",
            &[id],
        )
        .await
    }

    async fn upsert_repo(&self, repo: &RepoRecord) -> Result<()> {
        let now = Utc::now().timestamp();
        let git_metadata = repo
            .git_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO repos (id, path, name, repo_type, url, git_metadata, directory_json, last_seen, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                name = excluded.name,
                repo_type = excluded.repo_type,
                url = excluded.url,
                git_metadata = excluded.git_metadata,
                directory_json = excluded.directory_json,
                last_seen = excluded.last_seen,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(repo.id())
        .bind(&repo.directory.path().full)
        .bind(repo.name())
        .bind(repo.repo_type.as_str())
        .bind(&repo.url)
        .bind(git_metadata)
        .bind(serde_json::to_string(&repo.directory)?)
        .bind(repo.last_seen.timestamp())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_repo_file(&self, repo_id: &str, file_id: &str) -> Result<Option<StoredMeta>> {
        self.find_meta(
            "SELECT id, created_at, updated_at FROM repo_files WHERE repo_id = ? AND id = ?",
            &[repo_id, file_id],
        )
        .await
    }

    async fn insert_repo_file(&self, repo_id: &str, file: &RepoFile) -> Result<()> {
        let record = &file.record;
        let mut columns = common_columns(record, Utc::now().timestamp())?;
        columns.extend([
            ("repo_id", Value::text(repo_id)),
            ("repo_path", Value::text(file.repo_path.as_str())),
            ("kind", Value::text(record.kind().as_str())),
            ("content", Value::Text(record.text().map(str::to_string))),
        ]);

        let mut tx = self.pool.begin().await?;
        insert_row(&mut tx, "repo_files", &columns).await?;
        shred_lines(&mut tx, "repo_file_lines", Some(("repo_id", repo_id)), record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_vault(&self, id: &str) -> Result<Option<StoredMeta>> {
        self.find_meta(
            "SELECT id, created_at, updated_at FROM vaults WHERE id = ?",
            &[id],
        )
        .await
    }

    async fn upsert_vault(&self, vault: &VaultRecord) -> Result<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO vaults (id, path, has_marker, directory_json, last_seen, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                has_marker = excluded.has_marker,
                directory_json = excluded.directory_json,
                last_seen = excluded.last_seen,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(vault.id())
        .bind(&vault.directory.path().full)
        .bind(vault.has_marker)
        .bind(serde_json::to_string(&vault.directory)?)
        .bind(vault.last_seen.timestamp())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_note(&self, vault_id: &str, note_id: &str) -> Result<Option<StoredMeta>> {
        self.find_meta(
            "SELECT id, created_at, updated_at FROM vault_notes WHERE vault_id = ? AND id = ?",
            &[vault_id, note_id],
        )
        .await
    }

    async fn insert_note(&self, vault_id: &str, note: &NoteRecord) -> Result<()> {
        let record = &note.record;
        let mut columns = common_columns(record, Utc::now().timestamp())?;
        columns.extend([
            ("vault_id", Value::text(vault_id)),
            ("vault_path", Value::text(note.vault_path.as_str())),
            ("content", Value::text(record.text().unwrap_or_default())),
            ("obsidian_tags", Value::text(serde_json::to_string(&note.tags)?)),
            ("links", Value::text(serde_json::to_string(&note.links)?)),
            ("properties", Value::text(serde_json::to_string(&note.properties)?)),
        ]);

        let mut tx = self.pool.begin().await?;
        insert_row(&mut tx, "vault_notes", &columns).await?;
        shred_lines(&mut tx, "vault_note_lines", Some(("vault_id", vault_id)), record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn upsert_scan_root(&self, result: &ScanResult) -> Result<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO scan_roots (id, path, details, added_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                details = excluded.details,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&result.root)
        .bind(result.details().to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lines(&self, owner_id: &str) -> Result<Vec<LineRecord>> {
        // Same record ID means same content, so copies under other parents collapse.
        let union = LINE_TABLES
            .iter()
            .map(|t| format!("SELECT line_number, content FROM {} WHERE file_id = ?", t))
            .collect::<Vec<_>>()
            .join(" UNION ");
        let sql = format!("{} ORDER BY line_number", union);
        let mut query = sqlx::query_as::<_, (i64, String)>(&sql);
        for _ in LINE_TABLES {
            query = query.bind(owner_id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(n, content)| LineRecord::new(n as u32, content))
            .collect())
    }
}
