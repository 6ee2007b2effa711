//! Catalog statistics (`vcat stats`).
//!
//! Prints row counts for every catalog table and a per-make breakdown of
//! models, active trims and when the make was last verified.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::migrate::apply_schema;
use crate::sqlite_store::SqliteStore;
use crate::store::CatalogStore;

struct MakeStats {
    name: String,
    model_count: i64,
    active_trims: i64,
    last_verified_at: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    let store = SqliteStore::new(pool.clone());
    let counts = store.counts().await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Vehicle Catalog: Database Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Makes:       {}", counts.makes);
    println!("  Models:      {}", counts.models);
    println!(
        "  Trims:       {} active, {} inactive",
        counts.trims_active, counts.trims_inactive
    );
    println!("  Evidence:    {}", counts.evidence);

    let rows = sqlx::query(
        r#"
        SELECT
            m.name,
            m.last_verified_at,
            COUNT(DISTINCT mo.id) AS model_count,
            COUNT(DISTINCT CASE WHEN t.is_active = 1 THEN t.id END) AS active_trims
        FROM makes m
        LEFT JOIN models mo ON mo.make_id = m.id
        LEFT JOIN trims t ON t.model_id = mo.id
        GROUP BY m.id
        ORDER BY model_count DESC, m.normalized_name
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let makes: Vec<MakeStats> = rows
        .iter()
        .map(|row| MakeStats {
            name: row.get("name"),
            model_count: row.get("model_count"),
            active_trims: row.get("active_trims"),
            last_verified_at: row.get("last_verified_at"),
        })
        .collect();

    if !makes.is_empty() {
        println!();
        println!("  By make:");
        println!(
            "  {:<24} {:>7} {:>12}   {}",
            "MAKE", "MODELS", "ACTIVE TRIMS", "LAST VERIFIED"
        );
        println!("  {}", "-".repeat(66));

        for m in &makes {
            println!(
                "  {:<24} {:>7} {:>12}   {}",
                m.name,
                m.model_count,
                m.active_trims,
                format_ts_relative(m.last_verified_at)
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Relative time for recent timestamps, a date otherwise.
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
