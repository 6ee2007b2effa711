//! SQLite-backed [`CatalogStore`] implementation.
//!
//! Each upsert runs in its own short transaction: read the existing row,
//! combine it with the sighting through [`crate::merge`], then write with
//! `INSERT … ON CONFLICT … DO UPDATE … RETURNING id`.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::merge::{merge_make, merge_model, merge_trim, stale_trim_names};
use crate::models::{
    CatalogCounts, Make, MakeUpsert, Model, ModelUpsert, Trim, TrimAttributes, TrimEvidence,
    TrimUpsert,
};
use crate::store::CatalogStore;

/// SQLite implementation of the [`CatalogStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const MAKE_COLUMNS: &str =
    "id, name, normalized_name, country, source, source_key, last_verified_at";
const MODEL_COLUMNS: &str = "id, make_id, name, normalized_name, first_year, last_year, source, source_key, last_verified_at";
const TRIM_COLUMNS: &str = "id, model_id, year, trim_name, normalized_trim_name, body, doors, drive, transmission, fuel_type, market, source, source_key, is_active, last_verified_at";

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn make_from_row(row: &SqliteRow) -> Make {
    Make {
        id: row.get("id"),
        name: row.get("name"),
        normalized_name: row.get("normalized_name"),
        country: row.get("country"),
        source: row.get("source"),
        source_key: row.get("source_key"),
        last_verified_at: from_ts(row.get("last_verified_at")),
    }
}

fn model_from_row(row: &SqliteRow) -> Model {
    Model {
        id: row.get("id"),
        make_id: row.get("make_id"),
        name: row.get("name"),
        normalized_name: row.get("normalized_name"),
        first_year: row.get("first_year"),
        last_year: row.get("last_year"),
        source: row.get("source"),
        source_key: row.get("source_key"),
        last_verified_at: from_ts(row.get("last_verified_at")),
    }
}

fn trim_from_row(row: &SqliteRow) -> Trim {
    Trim {
        id: row.get("id"),
        model_id: row.get("model_id"),
        year: row.get("year"),
        trim_name: row.get("trim_name"),
        normalized_trim_name: row.get("normalized_trim_name"),
        attributes: TrimAttributes {
            body: row.get("body"),
            doors: row.get("doors"),
            drive: row.get("drive"),
            transmission: row.get("transmission"),
            fuel_type: row.get("fuel_type"),
        },
        market: row.get("market"),
        source: row.get("source"),
        source_key: row.get("source_key"),
        is_active: row.get("is_active"),
        last_verified_at: from_ts(row.get("last_verified_at")),
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn get_make_id(&self, normalized_name: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar("SELECT id FROM makes WHERE normalized_name = ?")
            .bind(normalized_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn get_model_id(&self, make_id: i64, normalized_name: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar(
            "SELECT id FROM models WHERE make_id = ? AND normalized_name = ?",
        )
        .bind(make_id)
        .bind(normalized_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn upsert_make(&self, make: &MakeUpsert) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(&format!(
            "SELECT {} FROM makes WHERE normalized_name = ?",
            MAKE_COLUMNS
        ))
        .bind(&make.normalized_name)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| make_from_row(&row));

        let merged = merge_make(existing.as_ref(), make);

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO makes (name, normalized_name, country, source, source_key, last_verified_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(normalized_name) DO UPDATE SET
                name = excluded.name,
                country = excluded.country,
                source = excluded.source,
                source_key = excluded.source_key,
                last_verified_at = excluded.last_verified_at
            RETURNING id
            "#,
        )
        .bind(&merged.name)
        .bind(&merged.normalized_name)
        .bind(&merged.country)
        .bind(&merged.source)
        .bind(&merged.source_key)
        .bind(merged.verified_at.timestamp())
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("Failed to upsert make '{}'", merged.name))?;

        tx.commit().await?;
        Ok(id)
    }

    async fn upsert_model(&self, model: &ModelUpsert) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(&format!(
            "SELECT {} FROM models WHERE make_id = ? AND normalized_name = ?",
            MODEL_COLUMNS
        ))
        .bind(model.make_id)
        .bind(&model.normalized_name)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| model_from_row(&row));

        let merged = merge_model(existing.as_ref(), model);

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO models (make_id, name, normalized_name, first_year, last_year, source, source_key, last_verified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(make_id, normalized_name) DO UPDATE SET
                name = excluded.name,
                first_year = excluded.first_year,
                last_year = excluded.last_year,
                source = excluded.source,
                source_key = excluded.source_key,
                last_verified_at = excluded.last_verified_at
            RETURNING id
            "#,
        )
        .bind(merged.make_id)
        .bind(&merged.name)
        .bind(&merged.normalized_name)
        .bind(merged.first_year)
        .bind(merged.last_year)
        .bind(&merged.source)
        .bind(&merged.source_key)
        .bind(merged.verified_at.timestamp())
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("Failed to upsert model '{}'", merged.name))?;

        tx.commit().await?;
        Ok(id)
    }

    async fn upsert_trim(&self, trim: &TrimUpsert) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(&format!(
            "SELECT {} FROM trims WHERE model_id = ? AND year = ? AND normalized_trim_name = ?",
            TRIM_COLUMNS
        ))
        .bind(trim.model_id)
        .bind(trim.year)
        .bind(&trim.normalized_trim_name)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| trim_from_row(&row));

        let merged = merge_trim(existing.as_ref(), trim);

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO trims (model_id, year, trim_name, normalized_trim_name, body, doors, drive,
                               transmission, fuel_type, market, source, source_key, is_active,
                               last_verified_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(model_id, year, normalized_trim_name) DO UPDATE SET
                trim_name = excluded.trim_name,
                body = excluded.body,
                doors = excluded.doors,
                drive = excluded.drive,
                transmission = excluded.transmission,
                fuel_type = excluded.fuel_type,
                market = excluded.market,
                source = excluded.source,
                source_key = excluded.source_key,
                is_active = excluded.is_active,
                last_verified_at = excluded.last_verified_at
            RETURNING id
            "#,
        )
        .bind(merged.model_id)
        .bind(merged.year)
        .bind(&merged.trim_name)
        .bind(&merged.normalized_trim_name)
        .bind(&merged.attributes.body)
        .bind(merged.attributes.doors)
        .bind(&merged.attributes.drive)
        .bind(&merged.attributes.transmission)
        .bind(&merged.attributes.fuel_type)
        .bind(&merged.market)
        .bind(&merged.source)
        .bind(&merged.source_key)
        .bind(merged.is_active)
        .bind(merged.verified_at.timestamp())
        .fetch_one(&mut *tx)
        .await
        .with_context(|| {
            format!(
                "Failed to upsert trim '{}' ({}) for model {}",
                merged.trim_name, merged.year, merged.model_id
            )
        })?;

        tx.commit().await?;
        Ok(id)
    }

    async fn insert_evidence(
        &self,
        trim_id: i64,
        source: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO trim_evidence (trim_id, source, payload, observed_at) VALUES (?, ?, ?, ?)",
        )
        .bind(trim_id)
        .bind(source)
        .bind(serde_json::to_string(payload)?)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate_stale_trims(
        &self,
        model_id: i64,
        year: i32,
        active_names: &BTreeSet<String>,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let stored: Vec<String> = sqlx::query_scalar(
            "SELECT normalized_trim_name FROM trims WHERE model_id = ? AND year = ?",
        )
        .bind(model_id)
        .bind(year)
        .fetch_all(&mut *tx)
        .await?;

        let stale = stale_trim_names(&stored, active_names);
        if stale.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().timestamp();
        let mut changed = 0;
        for name in &stale {
            let result = sqlx::query(
                r#"
                UPDATE trims SET is_active = 0, last_verified_at = ?
                WHERE model_id = ? AND year = ? AND normalized_trim_name = ?
                "#,
            )
            .bind(now)
            .bind(model_id)
            .bind(year)
            .bind(name)
            .execute(&mut *tx)
            .await?;
            changed += result.rows_affected();
        }

        tx.commit().await?;
        Ok(changed)
    }

    async fn get_make(&self, normalized_name: &str) -> Result<Option<Make>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM makes WHERE normalized_name = ?",
            MAKE_COLUMNS
        ))
        .bind(normalized_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| make_from_row(&r)))
    }

    async fn list_makes(&self) -> Result<Vec<Make>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM makes ORDER BY normalized_name",
            MAKE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(make_from_row).collect())
    }

    async fn list_models(&self, make_id: i64) -> Result<Vec<Model>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM models WHERE make_id = ? ORDER BY normalized_name",
            MODEL_COLUMNS
        ))
        .bind(make_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(model_from_row).collect())
    }

    async fn list_trims(&self, model_id: i64) -> Result<Vec<Trim>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM trims WHERE model_id = ? ORDER BY year, normalized_trim_name",
            TRIM_COLUMNS
        ))
        .bind(model_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(trim_from_row).collect())
    }

    async fn list_evidence(&self, trim_id: i64) -> Result<Vec<TrimEvidence>> {
        let rows = sqlx::query(
            "SELECT id, trim_id, source, payload, observed_at FROM trim_evidence WHERE trim_id = ? ORDER BY id",
        )
        .bind(trim_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<TrimEvidence> {
                let payload: String = row.get("payload");
                Ok(TrimEvidence {
                    id: row.get("id"),
                    trim_id: row.get("trim_id"),
                    source: row.get("source"),
                    payload: serde_json::from_str(&payload)?,
                    observed_at: from_ts(row.get("observed_at")),
                })
            })
            .collect()
    }

    async fn counts(&self) -> Result<CatalogCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM makes) AS makes,
                (SELECT COUNT(*) FROM models) AS models,
                (SELECT COUNT(*) FROM trims WHERE is_active = 1) AS trims_active,
                (SELECT COUNT(*) FROM trims WHERE is_active = 0) AS trims_inactive,
                (SELECT COUNT(*) FROM trim_evidence) AS evidence
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CatalogCounts {
            makes: row.get("makes"),
            models: row.get("models"),
            trims_active: row.get("trims_active"),
            trims_inactive: row.get("trims_inactive"),
            evidence: row.get("evidence"),
        })
    }
}
