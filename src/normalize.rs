//! Name normalization and candidate-name generation.
//!
//! The three providers disagree on spelling, hyphenation and parenthetical
//! suffixes. Everything in the reconciliation core matches entities through
//! [`normalize`], and every provider lookup that only accepts one spelling is
//! driven by an ordered list produced here ([`generate_variants`],
//! [`dedupe_preserve`]). Lists are tried in order and the first match wins.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static DRIVE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(awd|fwd|rwd|4wd|4x4)\b").unwrap());

static TRANSMISSION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)(at|mt)\b").unwrap());

const DRIVE_TOKENS: [&str; 5] = ["awd", "fwd", "rwd", "4wd", "4x4"];

/// CarQuery and DOE both emit this byte sequence in place of a right single quote.
const MOJIBAKE_APOSTROPHE: &str = "\u{e2}\u{20ac}\u{2122}";

/// Project free text onto the key used for uniqueness and matching.
///
/// Lowercases, maps every character that is not alphanumeric, `_` or
/// whitespace to a space (hyphens included), then collapses runs of
/// whitespace and trims. `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_spaces(&mapped)
}

/// Resolve a make spelling to its canonical display form.
///
/// Looks the normalized spelling up in a closed alias table and falls back
/// to the trimmed input.
pub fn canonicalize_make(text: &str) -> String {
    let canonical = match normalize(text).as_str() {
        "mercedes benz" | "mercedesbenz" => "Mercedes-Benz",
        "vw" => "Volkswagen",
        "ram" | "ram trucks" => "Ram",
        "mini" => "MINI",
        "alfa romeo" => "Alfa Romeo",
        "genesis" => "Genesis",
        "polestar" => "Polestar",
        _ => return text.trim().to_string(),
    };
    canonical.to_string()
}

/// Tidy a provider trim label for display.
///
/// Drops a trailing drivetrain token when the rest of the label already
/// names a drivetrain (`"LE AWD AWD"` → `"LE AWD"`) and spells out gearbox
/// codes (`"6AT"` → `"6 Automatic"`).
pub fn clean_trim_label(text: &str) -> String {
    let text = text.trim().replace("w/", "with ");
    let parts: Vec<&str> = text.split_whitespace().collect();

    let text = match parts.split_last() {
        Some((last, rest))
            if DRIVE_TOKENS.contains(&last.to_ascii_lowercase().as_str())
                && DRIVE_WORD.is_match(&rest.join(" ")) =>
        {
            rest.join(" ")
        }
        _ => text,
    };

    let text = TRANSMISSION_CODE.replace_all(&text, |caps: &Captures| {
        let label = if caps[2].eq_ignore_ascii_case("at") {
            "Automatic"
        } else {
            "Manual"
        };
        format!("{} {}", &caps[1], label)
    });

    collapse_spaces(&text)
}

/// Spelling variants of a model name, in the order they should be tried.
pub fn generate_variants(name: &str) -> Vec<String> {
    let base = collapse_spaces(name);
    let mut variants = vec![
        base.clone(),
        base.replace('-', " "),
        base.replace(' ', "-"),
        base.replace('/', " "),
        base.replace(MOJIBAKE_APOSTROPHE, "'"),
    ];
    if let Some((prefix, _)) = base.split_once('(') {
        variants.push(prefix.to_string());
    }
    dedupe_preserve(variants)
}

/// Collapse whitespace, drop blanks and case-insensitive repeats, keeping
/// the first spelling seen.
pub fn dedupe_preserve<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let collapsed = collapse_spaces(item.as_ref());
        if collapsed.is_empty() {
            continue;
        }
        if seen.insert(collapsed.to_lowercase()) {
            out.push(collapsed);
        }
    }
    out
}

pub fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse an optional provider string, mapping blank values to `None`.
pub fn clean_optional(value: Option<&str>) -> Option<String> {
    value.map(collapse_spaces).filter(|v| !v.is_empty())
}

/// Standardize drivetrain spellings (`4x4`, `Four-Wheel Drive` → `4WD`).
pub fn normalize_drivetrain(value: Option<&str>) -> Option<String> {
    let value = clean_optional(value)?.to_uppercase();
    let mapped = match value.as_str() {
        "4X4" | "FOUR-WHEEL DRIVE" | "FOUR WHEEL DRIVE" => "4WD".to_string(),
        _ => value,
    };
    Some(mapped)
}

/// Map transmission codes onto `Automatic` / `Manual`, passing anything
/// else through.
pub fn standard_transmission(value: Option<&str>) -> Option<String> {
    let value = clean_optional(value)?;
    let standard = match value.to_uppercase().as_str() {
        "AT" | "AUTO" | "AUTOMATIC" => "Automatic".to_string(),
        "MT" | "MANUAL" => "Manual".to_string(),
        _ => value,
    };
    Some(standard)
}
