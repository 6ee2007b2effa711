//! Catalog entities and the write requests that produce them.
//!
//! Rows (`Make`, `Model`, `Trim`, `TrimEvidence`) mirror the relational
//! schema created by [`crate::migrate`]. The `*Upsert` types carry one
//! sighting from the reconciliation pipeline to a [`crate::store::CatalogStore`];
//! the per-entity policy for combining a sighting with an existing row lives
//! in [`crate::merge`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Market written on every trim row.
pub const US_MARKET: &str = "US";

/// Canonical manufacturer.
#[derive(Debug, Clone, PartialEq)]
pub struct Make {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub country: Option<String>,
    pub source: String,
    pub source_key: Option<String>,
    pub last_verified_at: DateTime<Utc>,
}

/// A make's product line.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub id: i64,
    pub make_id: i64,
    pub name: String,
    pub normalized_name: String,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub source: String,
    pub source_key: Option<String>,
    pub last_verified_at: DateTime<Utc>,
}

/// Descriptive attributes of a trim, overwritten on every sighting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimAttributes {
    pub body: Option<String>,
    pub doors: Option<i32>,
    pub drive: Option<String>,
    pub transmission: Option<String>,
    pub fuel_type: Option<String>,
}

/// A specific (model, year) configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Trim {
    pub id: i64,
    pub model_id: i64,
    pub year: i32,
    pub trim_name: String,
    pub normalized_trim_name: String,
    pub attributes: TrimAttributes,
    pub market: String,
    pub source: String,
    pub source_key: Option<String>,
    pub is_active: bool,
    pub last_verified_at: DateTime<Utc>,
}

/// Append-only provenance record written alongside every trim upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimEvidence {
    pub id: i64,
    pub trim_id: i64,
    pub source: String,
    pub payload: serde_json::Value,
    pub observed_at: DateTime<Utc>,
}

/// One sighting of a make.
#[derive(Debug, Clone, PartialEq)]
pub struct MakeUpsert {
    pub name: String,
    pub normalized_name: String,
    pub country: Option<String>,
    pub source: String,
    pub source_key: Option<String>,
    pub verified_at: DateTime<Utc>,
}

/// One sighting of a model in a given year.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelUpsert {
    pub make_id: i64,
    pub name: String,
    pub normalized_name: String,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub source: String,
    pub source_key: Option<String>,
    pub verified_at: DateTime<Utc>,
}

/// One sighting of a trim.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimUpsert {
    pub model_id: i64,
    pub year: i32,
    pub trim_name: String,
    pub normalized_trim_name: String,
    pub attributes: TrimAttributes,
    pub market: String,
    pub source: String,
    pub source_key: Option<String>,
    pub is_active: bool,
    pub verified_at: DateTime<Utc>,
}

/// Row counts across the catalog tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub makes: i64,
    pub models: i64,
    pub trims_active: i64,
    pub trims_inactive: i64,
    pub evidence: i64,
}
