//! End-to-end tests of the sync pipeline.
//!
//! Providers are replaced by scripted in-memory sources, so these tests
//! exercise discovery, validation, upserts and retirement without network
//! access, against both catalog store backends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use vehicle_catalog::anomaly::{Anomaly, AnomalyKind};
use vehicle_catalog::db;
use vehicle_catalog::migrate;
use vehicle_catalog::models::CatalogCounts;
use vehicle_catalog::pipeline::{execute, run, ReportTarget, RunContext, SyncOptions};
use vehicle_catalog::sources::carquery::map_trim;
use vehicle_catalog::sources::{
    CarQueryTrim, MakeRecord, ModelRecord, SourceError, Sources, TrimRecord, VehicleSource,
};
use vehicle_catalog::sqlite_store::SqliteStore;
use vehicle_catalog::store::memory::InMemoryStore;
use vehicle_catalog::store::CatalogStore;
use vehicle_catalog::upsert::SyncStats;

// ─── Scripted provider ──────────────────────────────────────────────

type Reply<T> = Result<Vec<T>, SourceError>;

/// Answers from fixed tables keyed on the exact spelling queried.
/// Anything not scripted is an empty list. Every call is recorded.
#[derive(Default)]
struct ScriptedSource {
    makes: HashMap<i32, Reply<MakeRecord>>,
    models: HashMap<(String, i32), Reply<ModelRecord>>,
    trims: HashMap<(String, String, i32), Reply<TrimRecord>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn makes(self, year: i32, names: &[&str]) -> Self {
        self.make_records(year, names.iter().map(|n| MakeRecord::named(*n)).collect())
    }

    fn make_records(mut self, year: i32, records: Vec<MakeRecord>) -> Self {
        self.makes.insert(year, Ok(records));
        self
    }

    fn makes_fail(mut self, year: i32, err: SourceError) -> Self {
        self.makes.insert(year, Err(err));
        self
    }

    fn models(mut self, make: &str, year: i32, names: &[&str]) -> Self {
        let records = names
            .iter()
            .enumerate()
            .map(|(i, n)| ModelRecord {
                name: n.to_string(),
                source_key: Some(format!("{}", 100 + i)),
            })
            .collect();
        self.models.insert((make.to_string(), year), Ok(records));
        self
    }

    fn models_fail(mut self, make: &str, year: i32, err: SourceError) -> Self {
        self.models.insert((make.to_string(), year), Err(err));
        self
    }

    fn trims(mut self, make: &str, model: &str, year: i32, names: &[&str]) -> Self {
        let records = names.iter().map(|n| trim_record(model, n, year)).collect();
        self.trims
            .insert((make.to_string(), model.to_string(), year), Ok(records));
        self
    }

    fn trims_fail(mut self, make: &str, model: &str, year: i32, err: SourceError) -> Self {
        self.trims
            .insert((make.to_string(), model.to_string(), year), Err(err));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl VehicleSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list_makes(&self, year: i32) -> Result<Vec<MakeRecord>, SourceError> {
        self.record(format!("makes:{}", year));
        self.makes.get(&year).cloned().unwrap_or(Ok(Vec::new()))
    }

    async fn list_models(
        &self,
        make: &str,
        year: i32,
        sold_in_us: bool,
    ) -> Result<Vec<ModelRecord>, SourceError> {
        self.record(format!("models:{}:{}:{}", make, year, sold_in_us));
        self.models
            .get(&(make.to_string(), year))
            .cloned()
            .unwrap_or(Ok(Vec::new()))
    }

    async fn list_trims(
        &self,
        make: &str,
        model: &str,
        year: i32,
        sold_in_us: bool,
    ) -> Result<Vec<TrimRecord>, SourceError> {
        self.record(format!("trims:{}:{}:{}:{}", make, model, year, sold_in_us));
        self.trims
            .get(&(make.to_string(), model.to_string(), year))
            .cloned()
            .unwrap_or(Ok(Vec::new()))
    }
}

fn trim_record(model: &str, trim: &str, year: i32) -> TrimRecord {
    map_trim(
        CarQueryTrim {
            model_make_id: Some("toyota".to_string()),
            model_name: Some(model.to_string()),
            model_trim: Some(trim.to_string()),
            model_year: Some(year.to_string()),
            model_body: Some("Sedan".to_string()),
            model_doors: Some("4".to_string()),
            ..Default::default()
        },
        year,
    )
    .expect("scripted trim has a name")
}

fn denied() -> SourceError {
    SourceError::Denied("Access denied".to_string())
}

// ─── Harness ────────────────────────────────────────────────────────

struct Harness {
    doe: Arc<ScriptedSource>,
    carquery: Arc<ScriptedSource>,
    vpic: Arc<ScriptedSource>,
}

impl Harness {
    fn new(doe: ScriptedSource, carquery: ScriptedSource, vpic: ScriptedSource) -> Self {
        Self {
            doe: Arc::new(doe),
            carquery: Arc::new(carquery),
            vpic: Arc::new(vpic),
        }
    }

    fn sources(&self) -> Sources {
        Sources {
            doe: self.doe.clone(),
            carquery: self.carquery.clone(),
            vpic: self.vpic.clone(),
        }
    }

    fn context(&self, store: Arc<dyn CatalogStore>, dry_run: bool) -> RunContext {
        self.context_for(store, dry_run, None)
    }

    fn context_for(
        &self,
        store: Arc<dyn CatalogStore>,
        dry_run: bool,
        only_make: Option<&str>,
    ) -> RunContext {
        let options = SyncOptions {
            start_year: 2024,
            end_year: 2024,
            only_make: only_make.map(str::to_string),
            only_year: None,
            dry_run,
            use_cache: false,
            report_path: None,
        };
        RunContext::new(self.sources(), store, &options, Duration::ZERO)
    }
}

/// DOE lists Toyota with Camry and Corolla, CarQuery knows the make as
/// `toyota`, vPIC only lists Camry.
fn toyota_2024() -> Harness {
    Harness::new(
        ScriptedSource::default()
            .makes(2024, &["Toyota"])
            .models("Toyota", 2024, &["Camry", "Corolla"]),
        ScriptedSource::default()
            .make_records(
                2024,
                vec![MakeRecord {
                    name: "Toyota".to_string(),
                    aliases: vec!["toyota".to_string(), "Toyota".to_string()],
                    source_key: Some("toyota".to_string()),
                }],
            )
            .models("toyota", 2024, &["Camry", "Corolla"])
            .trims("toyota", "Camry", 2024, &["LE", "XSE"])
            .trims("toyota", "Corolla", 2024, &["L"]),
        ScriptedSource::default().models("Toyota", 2024, &["Camry"]),
    )
}

/// Toyota with a single Camry trim list per year, no CarQuery make list.
fn camry_years(trims: &[(i32, &[&str])]) -> Harness {
    let mut doe = ScriptedSource::default();
    let mut carquery = ScriptedSource::default();
    for (year, names) in trims {
        doe = doe.makes(*year, &["Toyota"]);
        carquery = carquery
            .models("Toyota", *year, &["Camry"])
            .trims("Toyota", "Camry", *year, names);
    }
    Harness::new(doe, carquery, ScriptedSource::default())
}

async fn sqlite_store(tmp: &TempDir) -> Arc<dyn CatalogStore> {
    let pool = db::connect_path(&tmp.path().join("catalog.sqlite"))
        .await
        .unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    Arc::new(SqliteStore::new(pool))
}

fn kinds(ctx: &RunContext) -> Vec<AnomalyKind> {
    ctx.anomalies.entries().iter().map(|a| a.kind).collect()
}

// ─── End-to-end scenario ────────────────────────────────────────────

async fn assert_toyota_scenario(store: Arc<dyn CatalogStore>) {
    let harness = toyota_2024();
    let mut ctx = harness.context(store.clone(), false);
    execute(&mut ctx, &[2024]).await.unwrap();

    assert_eq!(
        ctx.anomalies.entries(),
        &[Anomaly::for_model(
            AnomalyKind::ModelMissingVpic,
            2024,
            "Toyota",
            "Corolla"
        )]
    );
    assert_eq!(
        ctx.stats(),
        SyncStats {
            makes_created: 1,
            models_created: 2,
            trims_upserted: 3,
            evidence_written: 3,
            trims_deactivated: 0,
        }
    );

    let make = store.get_make("toyota").await.unwrap().unwrap();
    assert_eq!(make.name, "Toyota");
    assert_eq!(make.source, "carquery");
    assert_eq!(make.source_key.as_deref(), Some("toyota"));
    assert_eq!(make.country.as_deref(), Some("US"));

    let models = store.list_models(make.id).await.unwrap();
    let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Camry", "Corolla"]);
    for model in &models {
        assert_eq!(model.first_year, Some(2024));
        assert_eq!(model.last_year, Some(2024));
        assert_eq!(model.source, "carquery");
    }

    let camry_trims = store.list_trims(models[0].id).await.unwrap();
    let trim_names: Vec<&str> = camry_trims.iter().map(|t| t.trim_name.as_str()).collect();
    assert_eq!(trim_names, vec!["LE", "XSE"]);
    assert!(camry_trims.iter().all(|t| t.is_active && t.market == "US"));
    assert_eq!(camry_trims[0].source_key.as_deref(), Some("2024:LE"));
    assert_eq!(camry_trims[0].attributes.doors, Some(4));

    let evidence = store.list_evidence(camry_trims[0].id).await.unwrap();
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0].source, "carquery");
    assert_eq!(evidence[0].payload["model_trim"], "LE");

    let counts = store.counts().await.unwrap();
    assert_eq!(counts.makes, 1);
    assert_eq!(counts.models, 2);
    assert_eq!(counts.trims_active, 3);
    assert_eq!(counts.trims_inactive, 0);
    assert_eq!(counts.evidence, 3);

    // vPIC and DOE were asked with the canonical and DOE spellings.
    assert_eq!(harness.vpic.calls(), vec!["models:Toyota:2024:true"]);
    assert_eq!(
        harness.doe.calls(),
        vec!["makes:2024", "models:Toyota:2024:true"]
    );
}

#[tokio::test]
async fn toyota_scenario_in_memory() {
    assert_toyota_scenario(Arc::new(InMemoryStore::new())).await;
}

#[tokio::test]
async fn toyota_scenario_sqlite() {
    let tmp = TempDir::new().unwrap();
    assert_toyota_scenario(sqlite_store(&tmp).await).await;
}

#[tokio::test]
async fn dry_run_reports_same_anomalies_and_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store(&tmp).await;

    let harness = toyota_2024();
    let mut ctx = harness.context(store.clone(), true);
    execute(&mut ctx, &[2024]).await.unwrap();

    assert_eq!(kinds(&ctx), vec![AnomalyKind::ModelMissingVpic]);
    assert_eq!(ctx.stats(), SyncStats::default());
    assert_eq!(store.counts().await.unwrap(), CatalogCounts::default());

    // Discovery still ran for both models.
    let trim_calls = harness
        .carquery
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("trims:"))
        .count();
    assert_eq!(trim_calls, 2);
}

#[tokio::test]
async fn resync_is_idempotent() {
    let store: Arc<dyn CatalogStore> = Arc::new(InMemoryStore::new());
    let harness = toyota_2024();

    let mut first = harness.context(store.clone(), false);
    execute(&mut first, &[2024]).await.unwrap();
    let mut second = harness.context(store.clone(), false);
    execute(&mut second, &[2024]).await.unwrap();

    let stats = second.stats();
    assert_eq!(stats.makes_created, 0);
    assert_eq!(stats.models_created, 0);
    assert_eq!(stats.trims_upserted, 3);
    assert_eq!(stats.trims_deactivated, 0);

    let counts = store.counts().await.unwrap();
    assert_eq!((counts.makes, counts.models, counts.trims_active), (1, 2, 3));
    assert_eq!(counts.evidence, 6);
}

// ─── Year ranges and retirement ─────────────────────────────────────

#[tokio::test]
async fn model_year_range_widens_across_runs() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store(&tmp).await;
    let harness = camry_years(&[(2022, &["LE"]), (2023, &["LE"]), (2024, &["LE"])]);

    for year in [2024, 2022, 2023] {
        let mut ctx = harness.context(store.clone(), false);
        execute(&mut ctx, &[year]).await.unwrap();
    }

    let make = store.get_make("toyota").await.unwrap().unwrap();
    assert_eq!(make.source, "doe");
    assert_eq!(make.source_key.as_deref(), Some("Toyota"));

    let models = store.list_models(make.id).await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].first_year, Some(2022));
    assert_eq!(models[0].last_year, Some(2024));
    assert_eq!(store.list_trims(models[0].id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn stale_trims_retire_only_within_their_year() {
    let store: Arc<dyn CatalogStore> = Arc::new(InMemoryStore::new());

    let full = camry_years(&[(2023, &["LE", "XSE"]), (2024, &["LE", "XSE"])]);
    let mut ctx = full.context(store.clone(), false);
    execute(&mut ctx, &[2023, 2024]).await.unwrap();

    let reduced = camry_years(&[(2024, &["LE"])]);
    let mut ctx = reduced.context(store.clone(), false);
    execute(&mut ctx, &[2024]).await.unwrap();
    assert_eq!(ctx.stats().trims_deactivated, 1);

    let make_id = store.get_make_id("toyota").await.unwrap().unwrap();
    let model_id = store.get_model_id(make_id, "camry").await.unwrap().unwrap();
    let state: Vec<(i32, String, bool)> = store
        .list_trims(model_id)
        .await
        .unwrap()
        .into_iter()
        .map(|t| (t.year, t.normalized_trim_name, t.is_active))
        .collect();
    assert_eq!(
        state,
        vec![
            (2023, "le".to_string(), true),
            (2023, "xse".to_string(), true),
            (2024, "le".to_string(), true),
            (2024, "xse".to_string(), false),
        ]
    );

    // Seeing the trim again reactivates it.
    let mut ctx = full.context(store.clone(), false);
    execute(&mut ctx, &[2024]).await.unwrap();
    assert_eq!(store.counts().await.unwrap().trims_inactive, 0);
}

#[tokio::test]
async fn model_without_trims_keeps_existing_trims_active() {
    let store: Arc<dyn CatalogStore> = Arc::new(InMemoryStore::new());

    let with_trims = camry_years(&[(2024, &["LE"])]);
    execute(&mut with_trims.context(store.clone(), false), &[2024])
        .await
        .unwrap();

    let without_trims = Harness::new(
        ScriptedSource::default().makes(2024, &["Toyota"]),
        ScriptedSource::default().models("Toyota", 2024, &["Camry"]),
        ScriptedSource::default(),
    );
    let mut ctx = without_trims.context(store.clone(), false);
    execute(&mut ctx, &[2024]).await.unwrap();

    assert_eq!(kinds(&ctx), vec![AnomalyKind::NoTrims]);
    assert_eq!(store.counts().await.unwrap().trims_active, 1);
}

// ─── Fallbacks and anomalies ────────────────────────────────────────

#[tokio::test]
async fn doe_failure_falls_back_to_carquery_makes() {
    let store: Arc<dyn CatalogStore> = Arc::new(InMemoryStore::new());
    let harness = Harness::new(
        ScriptedSource::default()
            .makes_fail(2024, SourceError::Unavailable("timeout".to_string())),
        ScriptedSource::default()
            .make_records(
                2024,
                vec![MakeRecord {
                    name: "Toyota".to_string(),
                    aliases: vec!["toyota".to_string()],
                    source_key: Some("toyota".to_string()),
                }],
            )
            .models("toyota", 2024, &["Camry"])
            .trims("toyota", "Camry", 2024, &["LE"]),
        ScriptedSource::default(),
    );

    let mut ctx = harness.context(store.clone(), false);
    execute(&mut ctx, &[2024]).await.unwrap();

    assert_eq!(kinds(&ctx), vec![AnomalyKind::DoeFetchFailed]);
    let record = ctx.anomalies.entries()[0].to_record();
    assert!(record["detail"].contains("timeout"));

    // No DOE make list, so no DOE model list either.
    assert_eq!(harness.doe.calls(), vec!["makes:2024"]);

    let make = store.get_make("toyota").await.unwrap().unwrap();
    assert_eq!(make.source, "carquery");
    assert_eq!(store.counts().await.unwrap().trims_active, 1);
}

#[tokio::test]
async fn doe_model_failure_is_recorded_once_per_make() {
    let store: Arc<dyn CatalogStore> = Arc::new(InMemoryStore::new());
    let harness = Harness::new(
        ScriptedSource::default()
            .makes(2024, &["Toyota", "TOYOTA"])
            .models_fail("Toyota", 2024, SourceError::Unavailable("500".to_string())),
        ScriptedSource::default()
            .models("Toyota", 2024, &["Camry"])
            .trims("Toyota", "Camry", 2024, &["LE"]),
        ScriptedSource::default(),
    );

    let mut ctx = harness.context(store, false);
    execute(&mut ctx, &[2024]).await.unwrap();

    assert_eq!(kinds(&ctx), vec![AnomalyKind::DoeModelsFetchFailed]);
    assert_eq!(ctx.stats().trims_upserted, 1);
}

#[tokio::test]
async fn empty_providers_report_no_makes_per_year() {
    let harness = Harness::new(
        ScriptedSource::default(),
        ScriptedSource::default(),
        ScriptedSource::default(),
    );
    let mut ctx = harness.context(Arc::new(InMemoryStore::new()), false);
    execute(&mut ctx, &[2023, 2024]).await.unwrap();

    let years: Vec<(AnomalyKind, i32)> = ctx
        .anomalies
        .entries()
        .iter()
        .map(|a| (a.kind, a.year))
        .collect();
    assert_eq!(
        years,
        vec![(AnomalyKind::NoMakes, 2023), (AnomalyKind::NoMakes, 2024)]
    );
}

#[tokio::test]
async fn vpic_models_used_when_carquery_has_none() {
    let store: Arc<dyn CatalogStore> = Arc::new(InMemoryStore::new());
    let harness = Harness::new(
        ScriptedSource::default().makes(2024, &["Toyota"]),
        ScriptedSource::default(),
        ScriptedSource::default().models("Toyota", 2024, &["Camry", "camry"]),
    );

    let mut ctx = harness.context(store.clone(), false);
    execute(&mut ctx, &[2024]).await.unwrap();

    // The make and model are persisted even though no trims were found.
    assert_eq!(kinds(&ctx), vec![AnomalyKind::NoTrims]);
    let make_id = store.get_make_id("toyota").await.unwrap().unwrap();
    let models = store.list_models(make_id).await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].source, "vpic");
    assert_eq!(models[0].source_key.as_deref(), Some("100"));

    // Every make spelling was tried with and without the US filter.
    let model_calls: Vec<String> = harness
        .carquery
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("models:"))
        .collect();
    assert_eq!(
        model_calls,
        vec!["models:Toyota:2024:true", "models:Toyota:2024:false"]
    );
}

#[tokio::test]
async fn make_without_models_is_skipped() {
    let store: Arc<dyn CatalogStore> = Arc::new(InMemoryStore::new());
    let harness = Harness::new(
        ScriptedSource::default().makes(2024, &["Lotus"]),
        ScriptedSource::default(),
        ScriptedSource::default(),
    );
    let mut ctx = harness.context(store.clone(), false);
    execute(&mut ctx, &[2024]).await.unwrap();

    assert_eq!(
        ctx.anomalies.entries(),
        &[Anomaly::no_models_for_make(2024, "Lotus")]
    );
    assert_eq!(store.counts().await.unwrap().makes, 0);
}

#[tokio::test]
async fn only_make_filter_accepts_aliases() {
    let store: Arc<dyn CatalogStore> = Arc::new(InMemoryStore::new());
    let harness = Harness::new(
        ScriptedSource::default().makes(2024, &["Toyota", "Volkswagen"]),
        ScriptedSource::default()
            .models("Volkswagen", 2024, &["Golf"])
            .trims("Volkswagen", "Golf", 2024, &["GTI"]),
        ScriptedSource::default(),
    );
    let mut ctx = harness.context_for(store.clone(), false, Some("VW"));
    execute(&mut ctx, &[2024]).await.unwrap();

    let makes = store.list_makes().await.unwrap();
    assert_eq!(makes.len(), 1);
    assert_eq!(makes[0].name, "Volkswagen");
    assert!(harness
        .carquery
        .calls()
        .iter()
        .all(|c| !c.contains("Toyota")));
}

// ─── Provider refusals ──────────────────────────────────────────────

#[tokio::test]
async fn denied_model_lookup_skips_only_that_make() {
    let store: Arc<dyn CatalogStore> = Arc::new(InMemoryStore::new());
    let harness = Harness::new(
        ScriptedSource::default().makes(2024, &["Toyota", "Honda"]),
        ScriptedSource::default()
            .models_fail("Toyota", 2024, denied())
            .models("Honda", 2024, &["Civic"])
            .trims("Honda", "Civic", 2024, &["LX"]),
        ScriptedSource::default().models("Toyota", 2024, &["Camry"]),
    );

    let mut ctx = harness.context(store.clone(), false);
    execute(&mut ctx, &[2024]).await.unwrap();

    assert!(ctx.anomalies.is_empty());
    assert!(store.get_make("toyota").await.unwrap().is_none());
    assert!(store.get_make("honda").await.unwrap().is_some());
    // The refusal stopped the Toyota search after one call.
    assert_eq!(
        harness
            .carquery
            .calls()
            .iter()
            .filter(|c| c.contains("Toyota"))
            .count(),
        1
    );
    assert_eq!(harness.vpic.calls(), vec!["models:Honda:2024:true"]);
}

#[tokio::test]
async fn denied_trim_lookup_aborts_run_and_flushes_report() {
    let tmp = TempDir::new().unwrap();
    let store: Arc<dyn CatalogStore> = Arc::new(InMemoryStore::new());
    let harness = Harness::new(
        ScriptedSource::default()
            .makes(2024, &["Toyota"])
            .makes(2025, &["Toyota"])
            .models("Toyota", 2024, &["Corolla"]),
        ScriptedSource::default()
            .models("Toyota", 2024, &["Camry", "Corolla"])
            .trims_fail("Toyota", "Camry", 2024, denied()),
        ScriptedSource::default(),
    );

    let report_path = tmp.path().join("reports").join("dq.csv");
    let target = ReportTarget {
        explicit: Some(report_path.clone()),
        dir: tmp.path().to_path_buf(),
    };
    let mut ctx = harness.context(store.clone(), false);
    let err = run(&mut ctx, &[2024, 2025], &target).await.unwrap_err();

    let source_err = err.downcast_ref::<SourceError>().expect("source error");
    assert!(source_err.is_denied());
    assert!(format!("{:#}", err).contains("Camry"));

    // Camry was flagged before the abort; Corolla and 2025 never ran.
    assert_eq!(kinds(&ctx), vec![AnomalyKind::ModelMissingDoe]);
    assert!(!harness.doe.calls().contains(&"makes:2025".to_string()));
    assert_eq!(store.counts().await.unwrap().models, 1);

    let report = std::fs::read_to_string(&report_path).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[0], "make,model,type,year");
    assert_eq!(lines[1], "Toyota,Camry,model_missing_doe,2024");
}

#[tokio::test]
async fn report_defaults_to_timestamped_file_when_anomalies_exist() {
    let tmp = TempDir::new().unwrap();
    let harness = toyota_2024();
    let target = ReportTarget {
        explicit: None,
        dir: tmp.path().join("reports"),
    };
    let mut ctx = harness.context(Arc::new(InMemoryStore::new()), false);
    let written = run(&mut ctx, &[2024], &target).await.unwrap().unwrap();

    assert!(written.starts_with(tmp.path().join("reports")));
    let content = std::fs::read_to_string(&written).unwrap();
    assert!(content.contains("model_missing_vpic"));
}
