pub mod essence_store;

use crate::types::error::{BotError, Result};
use sqlx::sqlite::SqlitePool;
use std::path::Path;

/// Open (creating if needed) the essence database and apply the schema.
pub async fn init_essence_db(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| BotError::database(format!("create {}: {e}", parent.display())))?;
    }
    let url = format!("sqlite:{}?mode=rwc", db_path.display());
    let pool = SqlitePool::connect(&url).await?;

    sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON;").execute(&pool).await?;

    let migration = include_str!("../../migrations/001_create_essence_tables.sql");
    sqlx::raw_sql(migration).execute(&pool).await?;

    Ok(pool)
}
