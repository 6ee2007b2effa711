use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the catalog schema in the configured database (`vcat init`).
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all catalog tables and indexes. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS makes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            normalized_name TEXT NOT NULL UNIQUE,
            country TEXT,
            source TEXT NOT NULL,
            source_key TEXT,
            last_verified_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS models (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            make_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            normalized_name TEXT NOT NULL,
            first_year INTEGER,
            last_year INTEGER,
            source TEXT NOT NULL,
            source_key TEXT,
            last_verified_at INTEGER NOT NULL,
            UNIQUE(make_id, normalized_name),
            FOREIGN KEY (make_id) REFERENCES makes(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trims (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model_id INTEGER NOT NULL,
            year INTEGER NOT NULL,
            trim_name TEXT NOT NULL,
            normalized_trim_name TEXT NOT NULL,
            body TEXT,
            doors INTEGER,
            drive TEXT,
            transmission TEXT,
            fuel_type TEXT,
            market TEXT NOT NULL DEFAULT 'US',
            source TEXT NOT NULL,
            source_key TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            last_verified_at INTEGER NOT NULL,
            UNIQUE(model_id, year, normalized_trim_name),
            FOREIGN KEY (model_id) REFERENCES models(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only: no uniqueness beyond the row id.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS trim_evidence (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trim_id INTEGER NOT NULL,
            source TEXT NOT NULL,
            payload TEXT NOT NULL,
            observed_at INTEGER NOT NULL,
            FOREIGN KEY (trim_id) REFERENCES trims(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_models_make_id ON models(make_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trims_model_year ON trims(model_id, year)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_trim_evidence_trim_id ON trim_evidence(trim_id)")
        .execute(pool)
        .await?;

    Ok(())
}
