//! Cross-source model validation.
//!
//! vPIC and DOE each publish a model list per make. A model discovered
//! elsewhere but missing from a non-empty reference list is flagged. The
//! checks are informational and never block persistence.

use std::collections::{BTreeSet, HashMap};

use crate::anomaly::{Anomaly, AnomalyKind};
use crate::normalize::normalize;

/// Normalized model names from one reference source.
pub fn normalized_names<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|n| normalize(n.as_ref()))
        .filter(|n| !n.is_empty())
        .collect()
}

/// Reference model sets for one (year, make).
#[derive(Debug, Default, Clone)]
pub struct ModelReference {
    pub vpic: BTreeSet<String>,
    pub doe: BTreeSet<String>,
}

impl ModelReference {
    pub fn new(vpic: BTreeSet<String>, doe: BTreeSet<String>) -> Self {
        Self { vpic, doe }
    }

    /// Anomalies for a model absent from a non-empty reference list.
    pub fn check(&self, year: i32, make: &str, model: &str, normalized: &str) -> Vec<Anomaly> {
        let mut out = Vec::new();
        if !self.vpic.is_empty() && !self.vpic.contains(normalized) {
            out.push(Anomaly::for_model(
                AnomalyKind::ModelMissingVpic,
                year,
                make,
                model,
            ));
        }
        if !self.doe.is_empty() && !self.doe.contains(normalized) {
            out.push(Anomaly::for_model(
                AnomalyKind::ModelMissingDoe,
                year,
                make,
                model,
            ));
        }
        out
    }
}

/// DOE model sets fetched so far in the current year, keyed by normalized make.
#[derive(Debug, Default)]
pub struct DoeModelCache {
    by_make: HashMap<String, BTreeSet<String>>,
}

impl DoeModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, normalized_make: &str) -> bool {
        self.by_make.contains_key(normalized_make)
    }

    pub fn insert(&mut self, normalized_make: &str, models: BTreeSet<String>) {
        self.by_make.insert(normalized_make.to_string(), models);
    }

    /// The cached set, or an empty one if the make was never fetched.
    pub fn get(&self, normalized_make: &str) -> BTreeSet<String> {
        self.by_make.get(normalized_make).cloned().unwrap_or_default()
    }
}
