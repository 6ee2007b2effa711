//! Storage abstraction for the catalog.
//!
//! The [`CatalogStore`] trait is the persistence contract the upsert engine
//! writes through. Two backends ship with the crate:
//!
//! - [`crate::sqlite_store::SqliteStore`]: the relational store used by `vcat`.
//! - [`memory::InMemoryStore`]: in-process, for tests.
//!
//! Every write is one short-lived unit of work; there are no multi-statement
//! transactions spanning calls and no application-level locking.

pub mod memory;

use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    CatalogCounts, Make, MakeUpsert, Model, ModelUpsert, Trim, TrimEvidence, TrimUpsert,
};

/// Abstract persistence backend for makes, models, trims and evidence.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_make`](CatalogStore::upsert_make) | Insert or merge a make keyed on normalized name |
/// | [`upsert_model`](CatalogStore::upsert_model) | Insert or merge a model keyed on (make, normalized name) |
/// | [`upsert_trim`](CatalogStore::upsert_trim) | Insert or merge a trim keyed on (model, year, normalized name) |
/// | [`insert_evidence`](CatalogStore::insert_evidence) | Append a provenance row |
/// | [`deactivate_stale_trims`](CatalogStore::deactivate_stale_trims) | Retire cohort members not seen this pass |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_make_id(&self, normalized_name: &str) -> Result<Option<i64>>;

    async fn get_model_id(&self, make_id: i64, normalized_name: &str) -> Result<Option<i64>>;

    /// Merge the sighting into the make row and return its id.
    async fn upsert_make(&self, make: &MakeUpsert) -> Result<i64>;

    /// Merge the sighting into the model row (widening its year range) and
    /// return its id.
    async fn upsert_model(&self, model: &ModelUpsert) -> Result<i64>;

    /// Merge the sighting into the trim row, marking it active, and return its id.
    async fn upsert_trim(&self, trim: &TrimUpsert) -> Result<i64>;

    async fn insert_evidence(
        &self,
        trim_id: i64,
        source: &str,
        payload: &serde_json::Value,
    ) -> Result<()>;

    /// Deactivate every trim of `(model_id, year)` whose normalized name is
    /// not in `active_names`. Returns the number of rows deactivated.
    async fn deactivate_stale_trims(
        &self,
        model_id: i64,
        year: i32,
        active_names: &BTreeSet<String>,
    ) -> Result<u64>;

    async fn get_make(&self, normalized_name: &str) -> Result<Option<Make>>;

    async fn list_makes(&self) -> Result<Vec<Make>>;

    async fn list_models(&self, make_id: i64) -> Result<Vec<Model>>;

    /// Trims of a model, ordered by year then normalized name.
    async fn list_trims(&self, model_id: i64) -> Result<Vec<Trim>>;

    async fn list_evidence(&self, trim_id: i64) -> Result<Vec<TrimEvidence>>;

    async fn counts(&self) -> Result<CatalogCounts>;
}
