//! Multi-source discovery: which makes exist in a year, and which spelling
//! each provider accepts for a make, model and trim.
//!
//! Every lookup that depends on a spelling is an ordered candidate list fed
//! to [`first_hit`], which stops at the first non-empty answer and reports
//! a provider refusal separately from an ordinary miss:
//!
//! ```text
//! make candidates ──► ModelQuery (make × sold_in_us) ──► first_hit ──► Hit / Miss / Denied
//!                                 │ make that hit goes first
//!                                 ▼
//!                     TrimQuery (make × sold_in_us × model variant) ──► first_hit
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use crate::anomaly::{Anomaly, AnomalyLog};
use crate::normalize::{canonicalize_make, dedupe_preserve, generate_variants, normalize};
use crate::sources::{
    MakeRecord, ModelRecord, SourceError, Sources, TrimRecord, VehicleSource,
};

/// Outcome of a candidate search.
#[derive(Debug)]
pub enum Search<C, T> {
    /// The first candidate that produced a non-empty list.
    Hit { candidate: C, items: Vec<T> },
    /// Every candidate came back empty or failed.
    Miss,
    /// The provider refused service; remaining candidates were not tried.
    Denied(SourceError),
}

/// Try `candidates` in order, pausing after each provider call.
pub async fn first_hit<'a, C, T, F, Fut>(
    candidates: &'a [C],
    pause: Duration,
    mut query: F,
) -> Search<C, T>
where
    C: Clone + Debug,
    F: FnMut(&'a C) -> Fut,
    Fut: Future<Output = Result<Vec<T>, SourceError>>,
{
    for candidate in candidates {
        let result = query(candidate).await;
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        match result {
            Ok(items) if !items.is_empty() => {
                return Search::Hit {
                    candidate: candidate.clone(),
                    items,
                }
            }
            Ok(_) => {}
            Err(e) if e.is_denied() => return Search::Denied(e),
            Err(e) => tracing::debug!(?candidate, error = %e, "candidate failed"),
        }
    }
    Search::Miss
}

/// A make to process in one year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeEntry {
    /// Spelling from the list the make came from.
    pub original: String,
    pub canonical: String,
    pub normalized: String,
    /// Matching CarQuery make, if CarQuery lists it.
    pub carquery: Option<MakeRecord>,
}

impl MakeEntry {
    pub fn new(original: &str, carquery: Option<MakeRecord>) -> Self {
        let canonical = canonicalize_make(original);
        Self {
            original: original.trim().to_string(),
            normalized: normalize(&canonical),
            canonical,
            carquery,
        }
    }

    /// Spellings to try against CarQuery: native identifiers first, then the
    /// source spelling, then canonical forms.
    pub fn candidates(&self) -> Vec<String> {
        let native = self
            .carquery
            .iter()
            .flat_map(|record| record.aliases.iter().cloned());
        let canonical = &self.canonical;
        dedupe_preserve(native.chain([
            self.original.clone(),
            canonical.clone(),
            canonical.to_lowercase(),
            canonical.replace(' ', "-"),
            canonical.replace('-', " "),
        ]))
    }
}

/// The working make set for a year.
#[derive(Debug, Default)]
pub struct YearMakes {
    pub entries: Vec<MakeEntry>,
    /// DOE returned a non-empty make list, so DOE model lists are worth fetching.
    pub doe_listed: bool,
}

fn matches_filter(normalized: &str, only_make: Option<&str>) -> bool {
    only_make.map_or(true, |filter| normalize(&canonicalize_make(filter)) == normalized)
}

/// Build the year's make set: DOE first, CarQuery if DOE yields nothing.
///
/// A DOE failure is recorded as `doe_fetch_failed`; a CarQuery failure is
/// only logged. An empty result records `no_makes`.
pub async fn discover_makes(
    sources: &Sources,
    year: i32,
    only_make: Option<&str>,
    anomalies: &mut AnomalyLog,
) -> YearMakes {
    let doe_makes = match sources.doe.list_makes(year).await {
        Ok(makes) => makes,
        Err(e) => {
            tracing::warn!(year, source = sources.doe.name(), error = %e, "make list failed");
            anomalies.push(Anomaly::doe_fetch_failed(year, e.to_string()));
            Vec::new()
        }
    };

    let carquery_makes = match sources.carquery.list_makes(year).await {
        Ok(makes) => makes,
        Err(e) => {
            tracing::warn!(year, source = sources.carquery.name(), error = %e, "make list failed");
            Vec::new()
        }
    };

    let mut carquery_by_key: HashMap<String, MakeRecord> = HashMap::new();
    for record in &carquery_makes {
        let key = normalize(&canonicalize_make(&record.name));
        if !key.is_empty() {
            carquery_by_key.insert(key, record.clone());
        }
    }

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for record in &doe_makes {
        let mut entry = MakeEntry::new(&record.name, None);
        if entry.normalized.is_empty() || !matches_filter(&entry.normalized, only_make) {
            continue;
        }
        if seen.insert(entry.normalized.clone()) {
            entry.carquery = carquery_by_key.get(&entry.normalized).cloned();
            entries.push(entry);
        }
    }

    if entries.is_empty() {
        for record in &carquery_makes {
            let entry = MakeEntry::new(&record.name, Some(record.clone()));
            if entry.normalized.is_empty() || !matches_filter(&entry.normalized, only_make) {
                continue;
            }
            if seen.insert(entry.normalized.clone()) {
                entries.push(entry);
            }
        }
    }

    if entries.is_empty() {
        anomalies.push(Anomaly::no_makes(year));
    }

    tracing::info!(
        year,
        doe = doe_makes.len(),
        carquery = carquery_makes.len(),
        working = entries.len(),
        "make list resolved"
    );

    YearMakes {
        entries,
        doe_listed: !doe_makes.is_empty(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelQuery {
    pub make: String,
    pub sold_in_us: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimQuery {
    pub make: String,
    pub model: String,
    pub sold_in_us: bool,
}

/// Each make candidate with US-sold first, then all markets.
pub fn model_queries(make_candidates: &[String]) -> Vec<ModelQuery> {
    dedupe_preserve(make_candidates)
        .into_iter()
        .flat_map(|make| {
            [true, false].map(|sold_in_us| ModelQuery {
                make: make.clone(),
                sold_in_us,
            })
        })
        .collect()
}

/// make × sold_in_us × model variant, deduplicated case-insensitively.
/// `make_used` (the spelling that produced models) is tried first.
pub fn trim_queries(
    make_candidates: &[String],
    make_used: Option<&str>,
    model_name: &str,
) -> Vec<TrimQuery> {
    let makes = dedupe_preserve(make_used.into_iter().chain(make_candidates.iter().map(String::as_str)));
    let variants = generate_variants(model_name);

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for make in &makes {
        for sold_in_us in [true, false] {
            for model in &variants {
                if seen.insert((make.to_lowercase(), model.to_lowercase(), sold_in_us)) {
                    out.push(TrimQuery {
                        make: make.clone(),
                        model: model.clone(),
                        sold_in_us,
                    });
                }
            }
        }
    }
    out
}

pub async fn discover_models(
    carquery: &dyn VehicleSource,
    make_candidates: &[String],
    year: i32,
    pause: Duration,
) -> Search<ModelQuery, ModelRecord> {
    let queries = model_queries(make_candidates);
    first_hit(&queries, pause, |q| carquery.list_models(&q.make, year, q.sold_in_us)).await
}

pub async fn discover_trims(
    carquery: &dyn VehicleSource,
    queries: &[TrimQuery],
    year: i32,
    pause: Duration,
) -> Search<TrimQuery, TrimRecord> {
    first_hit(queries, pause, |q| {
        carquery.list_trims(&q.make, &q.model, year, q.sold_in_us)
    })
    .await
}
