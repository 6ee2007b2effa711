//! # Vehicle Catalog CLI (`vcat`)
//!
//! ## Usage
//!
//! ```bash
//! vcat --config ./config/vcat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vcat init` | Create the SQLite database and catalog tables |
//! | `vcat sync` | Reconcile providers into the catalog for a range of model years |
//! | `vcat stats` | Print catalog row counts and a per-make breakdown |
//!
//! ## Examples
//!
//! ```bash
//! # One make, one year, no writes
//! vcat sync --only-year 2024 --only-make Toyota --dry-run
//!
//! # Full configured range, bypassing the HTTP cache
//! vcat sync --no-cache --report ./reports/latest.csv
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `vcat=info,vehicle_catalog=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vehicle_catalog::{config, migrate, pipeline, stats};

/// Vehicle catalog reconciliation across CarQuery, NHTSA vPIC and DOE.
#[derive(Parser)]
#[command(
    name = "vcat",
    about = "Reconcile US vehicle make/model/trim data into one canonical catalog",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// A missing file falls back to built-in defaults.
    #[arg(long, global = true, default_value = "./config/vcat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Reconcile the providers into the catalog.
    ///
    /// Walks model years oldest first. Anomalies are written to a CSV report
    /// (`--report`, or a timestamped file under `reports.dir` when any exist).
    Sync {
        /// First model year (defaults to `sync.start_year`).
        #[arg(long)]
        start_year: Option<i32>,

        /// Last model year, inclusive (defaults to `sync.end_year`).
        #[arg(long)]
        end_year: Option<i32>,

        /// Only process this make (any spelling, e.g. `VW`).
        #[arg(long)]
        only_make: Option<String>,

        /// Only process this single model year.
        #[arg(long)]
        only_year: Option<i32>,

        /// Discover and validate without opening or writing the database.
        #[arg(long)]
        dry_run: bool,

        /// Bypass the on-disk HTTP response cache.
        #[arg(long)]
        no_cache: bool,

        /// Write the anomaly report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show catalog statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vcat=info,vehicle_catalog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync {
            start_year,
            end_year,
            only_make,
            only_year,
            dry_run,
            no_cache,
            report,
        } => {
            let defaults = pipeline::SyncOptions::from_config(&cfg);
            let options = pipeline::SyncOptions {
                start_year: start_year.unwrap_or(defaults.start_year),
                end_year: end_year.unwrap_or(defaults.end_year),
                only_make,
                only_year,
                dry_run,
                use_cache: defaults.use_cache && !no_cache,
                report_path: report,
            };
            pipeline::run_sync(&cfg, &options).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
