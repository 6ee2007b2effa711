//! Sync orchestration.
//!
//! One run walks years, then makes, then models, strictly in order:
//!
//! 1. Resolve the year's makes ([`discover_makes`]).
//! 2. Per make: CarQuery model search, vPIC model list, DOE model list
//!    (once per make and year), then the make upsert.
//! 3. Per model: upsert, cross-source checks, CarQuery trim search, trim
//!    upserts with evidence, stale trim retirement.
//!
//! All run state (providers, writer, counters, anomalies) lives in a
//! [`RunContext`]. Anomalies are flushed to the report once, including when
//! the run aborts.
//!
//! A CarQuery refusal during model search skips that make. The same refusal
//! during trim search aborts the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::anomaly::{Anomaly, AnomalyKind, AnomalyLog};
use crate::config::Config;
use crate::db;
use crate::discover::{discover_makes, discover_models, discover_trims, trim_queries, MakeEntry, Search};
use crate::migrate::apply_schema;
use crate::normalize::normalize;
use crate::report::{default_report_path, CsvReport, ReportSink};
use crate::sources::{ModelRecord, Sources};
use crate::sqlite_store::SqliteStore;
use crate::store::memory::InMemoryStore;
use crate::store::CatalogStore;
use crate::upsert::{ModelSighting, SyncStats, UpsertEngine};
use crate::validate::{normalized_names, DoeModelCache, ModelReference};

/// Parameters of one `vcat sync` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub start_year: i32,
    pub end_year: i32,
    pub only_make: Option<String>,
    pub only_year: Option<i32>,
    pub dry_run: bool,
    pub use_cache: bool,
    pub report_path: Option<PathBuf>,
}

impl SyncOptions {
    /// Options taken entirely from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            start_year: config.sync.start_year,
            end_year: config.sync.end_year,
            only_make: None,
            only_year: None,
            dry_run: false,
            use_cache: config.http.use_cache,
            report_path: None,
        }
    }

    /// Years to process, oldest first. `only_year` wins over the range.
    pub fn years(&self) -> Vec<i32> {
        match self.only_year {
            Some(year) => vec![year],
            None => (self.start_year..=self.end_year).collect(),
        }
    }
}

/// Everything a run reads from and writes to.
pub struct RunContext {
    pub sources: Sources,
    pub engine: UpsertEngine,
    pub anomalies: AnomalyLog,
    pub only_make: Option<String>,
    /// Delay after each provider call during model and trim discovery.
    pub pause: Duration,
}

impl RunContext {
    pub fn new(
        sources: Sources,
        store: Arc<dyn CatalogStore>,
        options: &SyncOptions,
        pause: Duration,
    ) -> Self {
        Self {
            sources,
            engine: UpsertEngine::new(store, options.dry_run),
            anomalies: AnomalyLog::new(),
            only_make: options.only_make.clone(),
            pause,
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.engine.stats()
    }

    async fn pause(&self) {
        if !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
    }
}

/// Where the anomaly report goes.
#[derive(Debug, Clone)]
pub struct ReportTarget {
    /// Used instead of a timestamped file name when set.
    pub explicit: Option<PathBuf>,
    /// Directory for a timestamped report when anomalies exist.
    pub dir: PathBuf,
}

/// Result of a completed sync.
#[derive(Debug)]
pub struct SyncOutcome {
    pub stats: SyncStats,
    pub anomalies: Vec<Anomaly>,
    pub report: Option<PathBuf>,
}

/// Run a full sync against the configured database and live providers.
pub async fn run_sync(config: &Config, options: &SyncOptions) -> Result<SyncOutcome> {
    if options.only_year.is_none() && options.start_year > options.end_year {
        bail!(
            "start year ({}) must be <= end year ({})",
            options.start_year,
            options.end_year
        );
    }

    // Dry runs never touch the catalog, so the database is not opened.
    let pool = if options.dry_run {
        None
    } else {
        let pool = db::connect(config).await?;
        apply_schema(&pool).await?;
        Some(pool)
    };
    let store: Arc<dyn CatalogStore> = match &pool {
        Some(pool) => Arc::new(SqliteStore::new(pool.clone())),
        None => Arc::new(InMemoryStore::new()),
    };
    let sources = Sources::from_config(config, options.use_cache && config.http.use_cache)?;

    let mut ctx = RunContext::new(
        sources,
        store,
        options,
        Duration::from_millis(config.sync.pause_ms),
    );
    let target = ReportTarget {
        explicit: options.report_path.clone(),
        dir: config.reports.dir.clone(),
    };

    let years = options.years();
    let report = run(&mut ctx, &years, &target).await;
    if let Some(pool) = pool {
        pool.close().await;
    }
    let report = report?;

    let stats = ctx.stats();
    let label = if options.dry_run { " (dry-run)" } else { "" };
    match (years.first(), years.last()) {
        (Some(first), Some(last)) if first != last => println!("sync {}-{}{}", first, last, label),
        (Some(year), _) => println!("sync {}{}", year, label),
        _ => println!("sync{}", label),
    }
    println!("  makes created: {}", stats.makes_created);
    println!("  models created: {}", stats.models_created);
    println!("  trims upserted: {}", stats.trims_upserted);
    println!("  evidence written: {}", stats.evidence_written);
    println!("  trims deactivated: {}", stats.trims_deactivated);
    println!("  anomalies: {}", ctx.anomalies.len());
    if let Some(path) = &report {
        println!("  report: {}", path.display());
    }
    println!("ok");

    Ok(SyncOutcome {
        stats,
        anomalies: ctx.anomalies.entries().to_vec(),
        report,
    })
}

/// Process `years` and flush the anomaly report, also on failure.
///
/// Returns the report path if one was written.
pub async fn run(
    ctx: &mut RunContext,
    years: &[i32],
    target: &ReportTarget,
) -> Result<Option<PathBuf>> {
    let result = execute(ctx, years).await;
    let flushed = flush_report(&ctx.anomalies, target);
    match (result, flushed) {
        (Ok(()), flushed) => flushed,
        (Err(e), Err(report_err)) => {
            tracing::error!(error = %report_err, "failed to write anomaly report");
            Err(e)
        }
        (Err(e), Ok(_)) => Err(e),
    }
}

/// Process `years` in order without writing a report.
pub async fn execute(ctx: &mut RunContext, years: &[i32]) -> Result<()> {
    for &year in years {
        tracing::info!(year, dry_run = ctx.engine.is_dry_run(), "syncing year");
        sync_year(ctx, year).await?;
    }
    Ok(())
}

fn flush_report(anomalies: &AnomalyLog, target: &ReportTarget) -> Result<Option<PathBuf>> {
    let path = match &target.explicit {
        Some(path) => path.clone(),
        None if !anomalies.is_empty() => default_report_path(&target.dir),
        None => return Ok(None),
    };
    CsvReport::new(&path).write(&anomalies.records())?;
    Ok((!anomalies.is_empty()).then_some(path))
}

async fn sync_year(ctx: &mut RunContext, year: i32) -> Result<()> {
    let makes = discover_makes(&ctx.sources, year, ctx.only_make.as_deref(), &mut ctx.anomalies).await;
    let mut doe_models = DoeModelCache::new();

    for entry in &makes.entries {
        sync_make(ctx, year, entry, makes.doe_listed, &mut doe_models).await?;
    }
    Ok(())
}

/// Per-make state shared by every model of that make.
struct MakeScope<'a> {
    year: i32,
    entry: &'a MakeEntry,
    candidates: &'a [String],
    make_used: Option<&'a str>,
    make_id: Option<i64>,
    reference: &'a ModelReference,
}

async fn sync_make(
    ctx: &mut RunContext,
    year: i32,
    entry: &MakeEntry,
    doe_listed: bool,
    doe_models: &mut DoeModelCache,
) -> Result<()> {
    let make = entry.canonical.as_str();
    let candidates = entry.candidates();

    let (carquery_models, make_used) =
        match discover_models(ctx.sources.carquery.as_ref(), &candidates, year, ctx.pause).await {
            Search::Hit { candidate, items } => (items, Some(candidate.make)),
            Search::Miss => (Vec::new(), None),
            Search::Denied(e) => {
                tracing::warn!(year, make, source = ctx.sources.carquery.name(), error = %e, "model lookup denied, skipping make");
                return Ok(());
            }
        };

    let vpic_models = match ctx.sources.vpic.list_models(make, year, true).await {
        Ok(models) => models,
        Err(e) => {
            tracing::warn!(year, make, source = ctx.sources.vpic.name(), error = %e, "model list failed");
            Vec::new()
        }
    };
    ctx.pause().await;

    if doe_listed && !doe_models.contains(&entry.normalized) {
        let names = match ctx.sources.doe.list_models(&entry.original, year, true).await {
            Ok(models) => normalized_names(models.iter().map(|m| m.name.as_str())),
            Err(e) => {
                tracing::warn!(year, make, source = ctx.sources.doe.name(), error = %e, "model list failed");
                ctx.anomalies
                    .push(Anomaly::doe_models_fetch_failed(year, make, e.to_string()));
                Default::default()
            }
        };
        ctx.pause().await;
        doe_models.insert(&entry.normalized, names);
    }

    let reference = ModelReference::new(
        normalized_names(vpic_models.iter().map(|m| m.name.as_str())),
        doe_models.get(&entry.normalized),
    );

    let sightings = model_sightings(&carquery_models, &vpic_models);
    if sightings.is_empty() {
        ctx.anomalies.push(Anomaly::no_models_for_make(year, make));
        return Ok(());
    }

    let (make_source, source_key) = match &entry.carquery {
        Some(record) => ("carquery", record.source_key.clone()),
        None => ("doe", Some(entry.canonical.clone())),
    };
    let make_id = ctx
        .engine
        .upsert_make(make, &entry.normalized, make_source, source_key)
        .await?;

    tracing::info!(
        year,
        make,
        models = sightings.len(),
        source = sightings[0].source,
        "models resolved"
    );

    let scope = MakeScope {
        year,
        entry,
        candidates: &candidates,
        make_used: make_used.as_deref(),
        make_id,
        reference: &reference,
    };
    for model in &sightings {
        sync_model(ctx, &scope, model).await?;
    }
    Ok(())
}

/// CarQuery models if there are any, otherwise vPIC's, deduplicated by
/// normalized name.
fn model_sightings(carquery: &[ModelRecord], vpic: &[ModelRecord]) -> Vec<ModelSighting> {
    let (records, source) = if carquery.is_empty() {
        (vpic, "vpic")
    } else {
        (carquery, "carquery")
    };

    let mut seen = std::collections::HashSet::new();
    records
        .iter()
        .filter_map(|record| {
            let normalized_name = normalize(&record.name);
            if normalized_name.is_empty() || !seen.insert(normalized_name.clone()) {
                return None;
            }
            Some(ModelSighting {
                name: record.name.clone(),
                normalized_name,
                source,
                source_key: record.source_key.clone(),
            })
        })
        .collect()
}

async fn sync_model(ctx: &mut RunContext, scope: &MakeScope<'_>, model: &ModelSighting) -> Result<()> {
    let year = scope.year;
    let make = scope.entry.canonical.as_str();

    let model_id = ctx.engine.upsert_model(scope.make_id, model, year).await?;

    for anomaly in scope
        .reference
        .check(year, make, &model.name, &model.normalized_name)
    {
        ctx.anomalies.push(anomaly);
    }

    let queries = trim_queries(scope.candidates, scope.make_used, &model.name);
    let trims = match discover_trims(ctx.sources.carquery.as_ref(), &queries, year, ctx.pause).await {
        Search::Hit { items, .. } => items,
        Search::Miss => {
            ctx.anomalies
                .push(Anomaly::for_model(AnomalyKind::NoTrims, year, make, &model.name));
            return Ok(());
        }
        Search::Denied(e) => {
            tracing::error!(year, make, model = %model.name, source = ctx.sources.carquery.name(), error = %e, "trim lookup denied, aborting run");
            return Err(anyhow::Error::new(e).context(format!(
                "CarQuery denied trim lookup for {} {} {}",
                year, make, model.name
            )));
        }
    };

    let seen = ctx.engine.upsert_trims(model_id, year, &trims).await?;
    ctx.engine.retire_stale(model_id, year, &seen).await?;
    tracing::debug!(year, make, model = %model.name, trims = seen.len(), "trims synced");
    Ok(())
}
