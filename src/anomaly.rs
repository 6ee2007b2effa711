//! Data-quality anomalies collected during a sync run.
//!
//! Anomalies never touch the catalog database. They accumulate in an
//! [`AnomalyLog`] for the whole run and are handed to a
//! [`crate::report::ReportSink`] once, as flat string records.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    DoeFetchFailed,
    DoeModelsFetchFailed,
    NoMakes,
    NoModelsForMake,
    ModelMissingVpic,
    ModelMissingDoe,
    NoTrims,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::DoeFetchFailed => "doe_fetch_failed",
            AnomalyKind::DoeModelsFetchFailed => "doe_models_fetch_failed",
            AnomalyKind::NoMakes => "no_makes",
            AnomalyKind::NoModelsForMake => "no_models_for_make",
            AnomalyKind::ModelMissingVpic => "model_missing_vpic",
            AnomalyKind::ModelMissingDoe => "model_missing_doe",
            AnomalyKind::NoTrims => "no_trims",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub year: i32,
    pub make: Option<String>,
    pub model: Option<String>,
    pub detail: Option<String>,
}

impl Anomaly {
    fn new(kind: AnomalyKind, year: i32) -> Self {
        Self {
            kind,
            year,
            make: None,
            model: None,
            detail: None,
        }
    }

    pub fn doe_fetch_failed(year: i32, detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::new(AnomalyKind::DoeFetchFailed, year)
        }
    }

    pub fn doe_models_fetch_failed(year: i32, make: &str, detail: impl Into<String>) -> Self {
        Self {
            make: Some(make.to_string()),
            detail: Some(detail.into()),
            ..Self::new(AnomalyKind::DoeModelsFetchFailed, year)
        }
    }

    pub fn no_makes(year: i32) -> Self {
        Self::new(AnomalyKind::NoMakes, year)
    }

    pub fn no_models_for_make(year: i32, make: &str) -> Self {
        Self {
            make: Some(make.to_string()),
            ..Self::new(AnomalyKind::NoModelsForMake, year)
        }
    }

    /// Anomaly about a single model (`model_missing_*`, `no_trims`).
    pub fn for_model(kind: AnomalyKind, year: i32, make: &str, model: &str) -> Self {
        Self {
            make: Some(make.to_string()),
            model: Some(model.to_string()),
            ..Self::new(kind, year)
        }
    }

    /// Flat record for the report sink. Absent fields are omitted.
    pub fn to_record(&self) -> BTreeMap<String, String> {
        let mut record = BTreeMap::new();
        record.insert("type".to_string(), self.kind.as_str().to_string());
        record.insert("year".to_string(), self.year.to_string());
        for (key, value) in [
            ("make", &self.make),
            ("model", &self.model),
            ("detail", &self.detail),
        ] {
            if let Some(value) = value {
                record.insert(key.to_string(), value.clone());
            }
        }
        record
    }
}

/// Append-only anomaly accumulator for one run.
#[derive(Debug, Default)]
pub struct AnomalyLog {
    entries: Vec<Anomaly>,
}

impl AnomalyLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, anomaly: Anomaly) {
        tracing::debug!(
            kind = %anomaly.kind,
            year = anomaly.year,
            make = anomaly.make.as_deref().unwrap_or(""),
            model = anomaly.model.as_deref().unwrap_or(""),
            "anomaly recorded"
        );
        self.entries.push(anomaly);
    }

    pub fn entries(&self) -> &[Anomaly] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.entries.iter().filter(|a| a.kind == kind).count()
    }

    pub fn records(&self) -> Vec<BTreeMap<String, String>> {
        self.entries.iter().map(Anomaly::to_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_carries_present_fields_only() {
        let record = Anomaly::no_makes(2024).to_record();
        assert_eq!(record.len(), 2);
        assert_eq!(record["type"], "no_makes");
        assert_eq!(record["year"], "2024");

        let record =
            Anomaly::for_model(AnomalyKind::ModelMissingVpic, 2024, "Toyota", "Corolla").to_record();
        assert_eq!(record["type"], "model_missing_vpic");
        assert_eq!(record["make"], "Toyota");
        assert_eq!(record["model"], "Corolla");
        assert!(!record.contains_key("detail"));
    }

    #[test]
    fn log_counts_by_kind() {
        let mut log = AnomalyLog::new();
        log.push(Anomaly::doe_fetch_failed(2023, "timeout"));
        log.push(Anomaly::no_models_for_make(2023, "Lotus"));
        log.push(Anomaly::no_models_for_make(2024, "Lotus"));
        assert_eq!(log.len(), 3);
        assert_eq!(log.count(AnomalyKind::NoModelsForMake), 2);
        assert_eq!(log.records()[0]["detail"], "timeout");
    }
}
