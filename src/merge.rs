//! Per-entity merge policy: `(existing, incoming) -> merged`.
//!
//! Stores call these before writing so the overwrite-versus-widen decision
//! for each field lives in one testable place rather than inside SQL.
//!
//! | Entity | Policy |
//! |--------|--------|
//! | Make | every attribute latest-write-wins |
//! | Model | descriptive attributes latest-write-wins, year range only widens |
//! | Trim | descriptive attributes latest-write-wins, `is_active` forced on |

use std::collections::BTreeSet;

use crate::models::{Make, MakeUpsert, Model, ModelUpsert, Trim, TrimUpsert};

pub fn merge_make(_existing: Option<&Make>, incoming: &MakeUpsert) -> MakeUpsert {
    incoming.clone()
}

/// Widen the stored year range to cover the incoming sighting.
///
/// A missing bound on either side is replaced by the other side's value.
pub fn merge_model(existing: Option<&Model>, incoming: &ModelUpsert) -> ModelUpsert {
    let mut merged = incoming.clone();
    if let Some(existing) = existing {
        merged.first_year = widen(existing.first_year, incoming.first_year, std::cmp::min);
        merged.last_year = widen(existing.last_year, incoming.last_year, std::cmp::max);
    }
    merged
}

pub fn merge_trim(_existing: Option<&Trim>, incoming: &TrimUpsert) -> TrimUpsert {
    TrimUpsert {
        is_active: true,
        ..incoming.clone()
    }
}

fn widen(existing: Option<i32>, incoming: Option<i32>, pick: fn(i32, i32) -> i32) -> Option<i32> {
    match (existing, incoming) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => b.or(a),
    }
}

/// Stored trim names of a cohort that the current pass did not see.
///
/// Returns nothing when `seen` is empty: a failed discovery pass must not be
/// read as "every trim was discontinued".
pub fn stale_trim_names<'a, I>(stored: I, seen: &BTreeSet<String>) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    if seen.is_empty() {
        return Vec::new();
    }
    let mut stale: Vec<String> = stored
        .into_iter()
        .filter(|name| !seen.contains(*name))
        .cloned()
        .collect();
    stale.sort();
    stale.dedup();
    stale
}
