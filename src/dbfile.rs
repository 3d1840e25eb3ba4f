//! Schema inspection of SQLite database files found during a scan.

use sqlx::Row;
use std::path::Path;

use crate::db;
use crate::error::{CatalogError, Result};
use file_catalog_core::record::DatabasePayload;

/// Read the DDL and table names from a SQLite file, read-only.
pub async fn inspect(path: &Path) -> Result<DatabasePayload> {
    let pool = db::connect_read_only(path)
        .await
        .map_err(|e| CatalogError::media(format!("{}: {}", path.display(), e)))?;

    let result = read_schema(&pool).await;
    pool.close().await;
    result.map_err(|e| CatalogError::media(format!("{}: {}", path.display(), e)))
}

async fn read_schema(pool: &sqlx::SqlitePool) -> std::result::Result<DatabasePayload, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT sql FROM sqlite_master WHERE sql IS NOT NULL ORDER BY type DESC, name",
    )
    .fetch_all(pool)
    .await?;
    let statements: Vec<String> = rows.iter().map(|r| r.get::<String, _>("sql")).collect();

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(DatabasePayload {
        schema: statements.join(";\n"),
        tables,
    })
}
