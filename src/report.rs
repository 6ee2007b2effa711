//! Anomaly report output.
//!
//! The pipeline hands every anomaly of a run to a [`ReportSink`] in one
//! call. [`CsvReport`] writes them as a CSV file whose header is the sorted
//! union of all record keys; missing cells are left empty.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Destination for flat anomaly records.
pub trait ReportSink {
    /// Write all records. An empty slice writes nothing.
    fn write(&self, records: &[BTreeMap<String, String>]) -> Result<()>;
}

pub struct CsvReport {
    path: PathBuf,
}

impl CsvReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for CsvReport {
    fn write(&self, records: &[BTreeMap<String, String>]) -> Result<()> {
        if records.is_empty() {
            tracing::info!("no anomalies to report");
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create report directory: {}", parent.display())
                })?;
            }
        }

        let header: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.keys().map(String::as_str))
            .collect();

        let mut writer = csv::WriterBuilder::new()
            .from_path(&self.path)
            .with_context(|| format!("Failed to create report: {}", self.path.display()))?;

        writer.write_record(&header)?;
        for record in records {
            writer.write_record(
                header
                    .iter()
                    .map(|key| record.get(*key).map(String::as_str).unwrap_or("")),
            )?;
        }
        writer.flush()?;

        tracing::info!(path = %self.path.display(), rows = records.len(), "anomaly report written");
        Ok(())
    }
}

/// `<dir>/dq_<UTC timestamp>.csv`.
pub fn default_report_path(dir: &Path) -> PathBuf {
    dir.join(format!("dq_{}.csv", Utc::now().format("%Y%m%d_%H%M%S")))
}
