//! TOML configuration with environment overrides.
//!
//! ```toml
//! [db]
//! path = "./data/catalog.sqlite"
//!
//! [http]
//! timeout_secs = 20
//! max_retries = 3
//! cache_dir = "./data/http-cache"
//! use_cache = true
//!
//! [sync]
//! start_year = 2015
//! end_year = 2024
//! pause_ms = 50
//!
//! [reports]
//! dir = "./reports"
//! ```
//!
//! Every section is optional. After parsing, `DATABASE_URL` replaces
//! `db.path` and `HTTP_TIMEOUT` replaces `http.timeout_secs`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/catalog.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            cache_dir: default_cache_dir(),
            use_cache: true,
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    20
}
fn default_max_retries() -> u32 {
    3
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/http-cache")
}
fn default_true() -> bool {
    true
}
fn default_user_agent() -> String {
    format!("vcat/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    #[serde(default = "default_end_year")]
    pub end_year: i32,
    /// Delay after each provider call during model and trim discovery.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_year: default_start_year(),
            end_year: default_end_year(),
            pause_ms: default_pause_ms(),
        }
    }
}

fn default_start_year() -> i32 {
    2015
}
fn default_end_year() -> i32 {
    2024
}
fn default_pause_ms() -> u64 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportsConfig {
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
        }
    }
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("./reports")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_carquery_url")]
    pub carquery_url: String,
    #[serde(default = "default_vpic_url")]
    pub vpic_url: String,
    #[serde(default = "default_doe_url")]
    pub doe_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            carquery_url: default_carquery_url(),
            vpic_url: default_vpic_url(),
            doe_url: default_doe_url(),
        }
    }
}

fn default_carquery_url() -> String {
    "https://www.carqueryapi.com/api/0.3/".to_string()
}
fn default_vpic_url() -> String {
    "https://vpic.nhtsa.dot.gov/api/vehicles".to_string()
}
fn default_doe_url() -> String {
    "https://www.fueleconomy.gov/ws/rest/vehicle/menu".to_string()
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Load configuration from `path`, apply environment overrides and validate.
///
/// A missing file is not an error: the defaults from [`Config::minimal`] are
/// used instead.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::minimal()
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Apply `DATABASE_URL` and `HTTP_TIMEOUT` from `lookup`.
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()) {
        config.db.path = sqlite_path_from_url(&url)?;
    }
    if let Some(timeout) = lookup("HTTP_TIMEOUT").filter(|v| !v.trim().is_empty()) {
        let secs: f64 = timeout
            .trim()
            .parse()
            .with_context(|| format!("HTTP_TIMEOUT must be a number of seconds, got '{}'", timeout))?;
        config.http.timeout_secs = secs.ceil() as u64;
    }
    Ok(config)
}

fn sqlite_path_from_url(url: &str) -> Result<PathBuf> {
    let url = url.trim();
    if let Some(rest) = url.strip_prefix("sqlite:") {
        let path = rest.trim_start_matches("//");
        if path.is_empty() {
            anyhow::bail!("DATABASE_URL '{}' has no database path", url);
        }
        return Ok(PathBuf::from(path));
    }
    if url.contains("://") {
        anyhow::bail!(
            "Unsupported DATABASE_URL scheme in '{}'. Use a sqlite: URL or a file path.",
            url
        );
    }
    Ok(PathBuf::from(url))
}

fn validate(config: &Config) -> Result<()> {
    if config.http.timeout_secs == 0 {
        anyhow::bail!("http.timeout_secs must be > 0");
    }
    for (label, year) in [
        ("sync.start_year", config.sync.start_year),
        ("sync.end_year", config.sync.end_year),
    ] {
        if !(1900..=2100).contains(&year) {
            anyhow::bail!("{} must be between 1900 and 2100, got {}", label, year);
        }
    }
    if config.sync.start_year > config.sync.end_year {
        anyhow::bail!(
            "sync.start_year ({}) must be <= sync.end_year ({})",
            config.sync.start_year,
            config.sync.end_year
        );
    }
    Ok(())
}
