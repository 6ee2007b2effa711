//! In-memory [`CatalogStore`] implementation for testing.
//!
//! Uses `Vec`s behind `std::sync::RwLock` and the same merge functions as
//! the SQLite store, so both backends agree on upsert semantics.

use std::collections::BTreeSet;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::merge::{merge_make, merge_model, merge_trim, stale_trim_names};
use crate::models::{
    CatalogCounts, Make, MakeUpsert, Model, ModelUpsert, Trim, TrimEvidence, TrimUpsert,
};

use super::CatalogStore;

#[derive(Default)]
struct Tables {
    makes: Vec<Make>,
    models: Vec<Model>,
    trims: Vec<Trim>,
    evidence: Vec<TrimEvidence>,
}

/// In-memory catalog store. Ids are assigned sequentially per table.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn next_id(len: usize) -> i64 {
    len as i64 + 1
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_make_id(&self, normalized_name: &str) -> Result<Option<i64>> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .makes
            .iter()
            .find(|m| m.normalized_name == normalized_name)
            .map(|m| m.id))
    }

    async fn get_model_id(&self, make_id: i64, normalized_name: &str) -> Result<Option<i64>> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .models
            .iter()
            .find(|m| m.make_id == make_id && m.normalized_name == normalized_name)
            .map(|m| m.id))
    }

    async fn upsert_make(&self, make: &MakeUpsert) -> Result<i64> {
        let mut tables = self.tables.write().unwrap();
        let position = tables
            .makes
            .iter()
            .position(|m| m.normalized_name == make.normalized_name);
        let merged = merge_make(position.map(|i| &tables.makes[i]), make);
        let id = position
            .map(|i| tables.makes[i].id)
            .unwrap_or_else(|| next_id(tables.makes.len()));
        let row = Make {
            id,
            name: merged.name,
            normalized_name: merged.normalized_name,
            country: merged.country,
            source: merged.source,
            source_key: merged.source_key,
            last_verified_at: merged.verified_at,
        };
        match position {
            Some(i) => tables.makes[i] = row,
            None => tables.makes.push(row),
        }
        Ok(id)
    }

    async fn upsert_model(&self, model: &ModelUpsert) -> Result<i64> {
        let mut tables = self.tables.write().unwrap();
        let position = tables.models.iter().position(|m| {
            m.make_id == model.make_id && m.normalized_name == model.normalized_name
        });
        let merged = merge_model(position.map(|i| &tables.models[i]), model);
        let id = position
            .map(|i| tables.models[i].id)
            .unwrap_or_else(|| next_id(tables.models.len()));
        let row = Model {
            id,
            make_id: merged.make_id,
            name: merged.name,
            normalized_name: merged.normalized_name,
            first_year: merged.first_year,
            last_year: merged.last_year,
            source: merged.source,
            source_key: merged.source_key,
            last_verified_at: merged.verified_at,
        };
        match position {
            Some(i) => tables.models[i] = row,
            None => tables.models.push(row),
        }
        Ok(id)
    }

    async fn upsert_trim(&self, trim: &TrimUpsert) -> Result<i64> {
        let mut tables = self.tables.write().unwrap();
        let position = tables.trims.iter().position(|t| {
            t.model_id == trim.model_id
                && t.year == trim.year
                && t.normalized_trim_name == trim.normalized_trim_name
        });
        let merged = merge_trim(position.map(|i| &tables.trims[i]), trim);
        let id = position
            .map(|i| tables.trims[i].id)
            .unwrap_or_else(|| next_id(tables.trims.len()));
        let row = Trim {
            id,
            model_id: merged.model_id,
            year: merged.year,
            trim_name: merged.trim_name,
            normalized_trim_name: merged.normalized_trim_name,
            attributes: merged.attributes,
            market: merged.market,
            source: merged.source,
            source_key: merged.source_key,
            is_active: merged.is_active,
            last_verified_at: merged.verified_at,
        };
        match position {
            Some(i) => tables.trims[i] = row,
            None => tables.trims.push(row),
        }
        Ok(id)
    }

    async fn insert_evidence(
        &self,
        trim_id: i64,
        source: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let mut tables = self.tables.write().unwrap();
        let id = next_id(tables.evidence.len());
        tables.evidence.push(TrimEvidence {
            id,
            trim_id,
            source: source.to_string(),
            payload: payload.clone(),
            observed_at: Utc::now(),
        });
        Ok(())
    }

    async fn deactivate_stale_trims(
        &self,
        model_id: i64,
        year: i32,
        active_names: &BTreeSet<String>,
    ) -> Result<u64> {
        let mut tables = self.tables.write().unwrap();
        let stored: Vec<String> = tables
            .trims
            .iter()
            .filter(|t| t.model_id == model_id && t.year == year)
            .map(|t| t.normalized_trim_name.clone())
            .collect();
        let stale = stale_trim_names(&stored, active_names);
        if stale.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut changed = 0;
        for trim in tables.trims.iter_mut().filter(|t| {
            t.model_id == model_id && t.year == year && stale.contains(&t.normalized_trim_name)
        }) {
            trim.is_active = false;
            trim.last_verified_at = now;
            changed += 1;
        }
        Ok(changed)
    }

    async fn get_make(&self, normalized_name: &str) -> Result<Option<Make>> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .makes
            .iter()
            .find(|m| m.normalized_name == normalized_name)
            .cloned())
    }

    async fn list_makes(&self) -> Result<Vec<Make>> {
        let tables = self.tables.read().unwrap();
        let mut makes = tables.makes.clone();
        makes.sort_by(|a, b| a.normalized_name.cmp(&b.normalized_name));
        Ok(makes)
    }

    async fn list_models(&self, make_id: i64) -> Result<Vec<Model>> {
        let tables = self.tables.read().unwrap();
        let mut models: Vec<Model> = tables
            .models
            .iter()
            .filter(|m| m.make_id == make_id)
            .cloned()
            .collect();
        models.sort_by(|a, b| a.normalized_name.cmp(&b.normalized_name));
        Ok(models)
    }

    async fn list_trims(&self, model_id: i64) -> Result<Vec<Trim>> {
        let tables = self.tables.read().unwrap();
        let mut trims: Vec<Trim> = tables
            .trims
            .iter()
            .filter(|t| t.model_id == model_id)
            .cloned()
            .collect();
        trims.sort_by(|a, b| {
            a.year
                .cmp(&b.year)
                .then_with(|| a.normalized_trim_name.cmp(&b.normalized_trim_name))
        });
        Ok(trims)
    }

    async fn list_evidence(&self, trim_id: i64) -> Result<Vec<TrimEvidence>> {
        let tables = self.tables.read().unwrap();
        Ok(tables
            .evidence
            .iter()
            .filter(|e| e.trim_id == trim_id)
            .cloned()
            .collect())
    }

    async fn counts(&self) -> Result<CatalogCounts> {
        let tables = self.tables.read().unwrap();
        let active = tables.trims.iter().filter(|t| t.is_active).count() as i64;
        Ok(CatalogCounts {
            makes: tables.makes.len() as i64,
            models: tables.models.len() as i64,
            trims_active: active,
            trims_inactive: tables.trims.len() as i64 - active,
            evidence: tables.evidence.len() as i64,
        })
    }
}
