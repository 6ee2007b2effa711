//! The only writer of catalog rows.
//!
//! Wraps a [`CatalogStore`] with the run's counters and the dry-run switch.
//! In dry-run mode every method returns without touching the store, including
//! the existence lookups that feed the `*_created` counters.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use crate::models::{MakeUpsert, ModelUpsert, TrimUpsert, US_MARKET};
use crate::sources::TrimRecord;
use crate::store::CatalogStore;

/// Counters reported at the end of a sync.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
    pub makes_created: u64,
    pub models_created: u64,
    pub trims_upserted: u64,
    pub evidence_written: u64,
    pub trims_deactivated: u64,
}

/// Where a model sighting came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSighting {
    pub name: String,
    pub normalized_name: String,
    pub source: &'static str,
    pub source_key: Option<String>,
}

pub struct UpsertEngine {
    store: Arc<dyn CatalogStore>,
    dry_run: bool,
    stats: SyncStats,
}

impl UpsertEngine {
    pub fn new(store: Arc<dyn CatalogStore>, dry_run: bool) -> Self {
        Self {
            store,
            dry_run,
            stats: SyncStats::default(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Insert or refresh a make. `None` in dry-run.
    pub async fn upsert_make(
        &mut self,
        name: &str,
        normalized_name: &str,
        source: &str,
        source_key: Option<String>,
    ) -> Result<Option<i64>> {
        if self.dry_run {
            return Ok(None);
        }

        let existing = self.store.get_make_id(normalized_name).await?;
        let id = self
            .store
            .upsert_make(&MakeUpsert {
                name: name.to_string(),
                normalized_name: normalized_name.to_string(),
                country: Some(US_MARKET.to_string()),
                source: source.to_string(),
                source_key,
                verified_at: Utc::now(),
            })
            .await?;

        if existing.is_none() {
            self.stats.makes_created += 1;
            tracing::debug!(make = name, id, "make created");
        }
        Ok(Some(id))
    }

    /// Insert a model or widen its year range to include `year`.
    pub async fn upsert_model(
        &mut self,
        make_id: Option<i64>,
        model: &ModelSighting,
        year: i32,
    ) -> Result<Option<i64>> {
        let Some(make_id) = make_id.filter(|_| !self.dry_run) else {
            return Ok(None);
        };

        let existing = self
            .store
            .get_model_id(make_id, &model.normalized_name)
            .await?;
        let id = self
            .store
            .upsert_model(&ModelUpsert {
                make_id,
                name: model.name.clone(),
                normalized_name: model.normalized_name.clone(),
                first_year: Some(year),
                last_year: Some(year),
                source: model.source.to_string(),
                source_key: model.source_key.clone(),
                verified_at: Utc::now(),
            })
            .await?;

        if existing.is_none() {
            self.stats.models_created += 1;
            tracing::debug!(model = %model.name, id, "model created");
        }
        Ok(Some(id))
    }

    /// Upsert one (model, year) cohort of trims, writing evidence for each.
    ///
    /// Repeated normalized names within `trims` are skipped. Returns the set
    /// of normalized names seen, which is also computed in dry-run.
    pub async fn upsert_trims(
        &mut self,
        model_id: Option<i64>,
        year: i32,
        trims: &[TrimRecord],
    ) -> Result<BTreeSet<String>> {
        let mut seen = BTreeSet::new();
        let model_id = model_id.filter(|_| !self.dry_run);

        for trim in trims {
            if trim.normalized_trim_name.is_empty()
                || !seen.insert(trim.normalized_trim_name.clone())
            {
                continue;
            }
            let Some(model_id) = model_id else {
                continue;
            };

            let source = trim.payload.source();
            let trim_id = self
                .store
                .upsert_trim(&TrimUpsert {
                    model_id,
                    year,
                    trim_name: trim.trim_name.clone(),
                    normalized_trim_name: trim.normalized_trim_name.clone(),
                    attributes: trim.attributes.clone(),
                    market: US_MARKET.to_string(),
                    source: source.to_string(),
                    source_key: Some(trim.source_key.clone()),
                    is_active: true,
                    verified_at: Utc::now(),
                })
                .await?;
            self.stats.trims_upserted += 1;

            self.store
                .insert_evidence(trim_id, source, &trim.payload.to_json())
                .await?;
            self.stats.evidence_written += 1;
        }

        Ok(seen)
    }

    /// Deactivate trims of (model, year) that were not in `seen`.
    pub async fn retire_stale(
        &mut self,
        model_id: Option<i64>,
        year: i32,
        seen: &BTreeSet<String>,
    ) -> Result<u64> {
        let Some(model_id) = model_id.filter(|_| !self.dry_run) else {
            return Ok(0);
        };
        if seen.is_empty() {
            return Ok(0);
        }

        let changed = self
            .store
            .deactivate_stale_trims(model_id, year, seen)
            .await?;
        if changed > 0 {
            tracing::info!(model_id, year, changed, "stale trims deactivated");
        }
        self.stats.trims_deactivated += changed;
        Ok(changed)
    }
}
