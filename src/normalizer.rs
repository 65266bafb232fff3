//! Column-name normalization
//!
//! [`normalize`] renames extractor-specific columns onto a small canonical
//! vocabulary. [`suggest_display_names`] proposes presentation labels from
//! sampled values. Both are advisory: matching and filtering work on either
//! the original or the normalized names.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::record::{display_value, Record, RecordSet};

/// Canonical name and the substrings that imply it, in precedence order
const CANONICAL: &[(&str, &[&str])] = &[
    ("title", &["title", "name", "product", "headline", "job", "movie", "item name"]),
    ("price", &["price", "cost", "$", "amount"]),
    ("rating", &["rating", "score", "stars", "review", "avg score"]),
    ("date", &["date", "year", "posted", "published", "release", "released"]),
    ("location", &["location", "city", "address", "region"]),
    ("beds", &["bedrooms", "beds"]),
    ("bath", &["bathrooms", "bath"]),
];

/// Values inspected per column when suggesting display names
const SAMPLE_SIZE: usize = 10;

/// Leading structural tokens and their readable replacements
const TOKEN_NAMES: &[(&str, &str)] = &[
    ("h1", "title"),
    ("h2", "subtitle"),
    ("h3", "heading"),
    ("p", "description"),
    ("span", "text"),
    ("a", "link"),
    ("div", "content"),
    ("class", "type"),
];

/// Whole harvested names with a better reading
const WHOLE_NAMES: &[(&str, &str)] = &[
    ("link_url", "url"),
    ("link_1_url", "url"),
    ("link_text", "link_text"),
    ("link_1_text", "link_text"),
    ("image_src", "image"),
    ("image_1_src", "image"),
    ("image_1_alt", "image_alt"),
];

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("valid regex"));
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_\s]+").expect("valid regex"));

/// Canonical name for a column, if any substring rule matches
pub fn canonical_name(column: &str) -> Option<&'static str> {
    let lower = column.to_lowercase();
    CANONICAL
        .iter()
        .find(|(_, variants)| variants.iter().any(|v| lower.contains(v)))
        .map(|(name, _)| *name)
}

/// Rename every column of every record onto the canonical vocabulary.
/// Unmatched names pass through unchanged; when two columns of a row land on
/// the same name the later one gets a `_2`, `_3`, ... suffix.
pub fn normalize(records: &[Record]) -> Vec<Record> {
    records.iter().map(normalize_record).collect()
}

fn normalize_record(record: &Record) -> Record {
    let mut out = Record::new();
    for (key, value) in record {
        let base = canonical_name(key).map_or_else(|| key.clone(), String::from);
        let mut name = base.clone();
        let mut n = 2;
        while out.contains_key(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        out.insert(name, value.clone());
    }
    out
}

/// Normalize a record set and recompute its profile
pub fn normalize_record_set(set: &RecordSet) -> RecordSet {
    set.with_records(normalize(&set.records))
}

/// Presentation label per column, judged from up to ten sampled values and
/// falling back to a cleaned-up version of the name.
pub fn suggest_display_names(set: &RecordSet) -> BTreeMap<String, String> {
    set.columns
        .iter()
        .map(|column| {
            let samples: Vec<&Value> = set
                .records
                .iter()
                .filter_map(|r| r.get(column))
                .filter(|v| !v.is_null())
                .take(SAMPLE_SIZE)
                .collect();
            (column.clone(), display_name(column, &samples))
        })
        .collect()
}

fn display_name(column: &str, samples: &[&Value]) -> String {
    let texts: Vec<String> = samples.iter().map(|v| display_value(v)).collect();

    if texts.iter().any(|t| t.contains("http")) {
        "URL".to_string()
    } else if texts.iter().any(|t| t.contains('@')) {
        "Email".to_string()
    } else if samples
        .iter()
        .any(|v| v.as_str().is_some_and(|s| DIGITS.is_match(s)))
    {
        "ID".to_string()
    } else if texts.iter().any(|t| t.chars().count() > 100) {
        "Description".to_string()
    } else if texts.iter().any(|t| is_upper(t)) {
        "Title".to_string()
    } else {
        clean_column_name(column)
    }
}

/// At least one cased character and no lowercase ones
fn is_upper(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

/// Readable form of a structural column name: `attr_data-id` becomes
/// `Data-Id`, `h2_1` becomes `Subtitle 1`, `link_1_url` becomes `Url`.
pub fn clean_column_name(column: &str) -> String {
    let mut name = column.to_lowercase();

    if let Some((_, readable)) = WHOLE_NAMES.iter().find(|(raw, _)| *raw == name) {
        name = (*readable).to_string();
    } else {
        for prefix in ["attr_", "child_"] {
            if let Some(rest) = name.strip_prefix(prefix) {
                name = rest.to_string();
                break;
            }
        }
        if let Some(rest) = name.strip_suffix("_text") {
            name = rest.to_string();
        }

        let (head, tail) = match name.split_once('_') {
            Some((head, tail)) => (head.to_string(), Some(tail.to_string())),
            None => (name.clone(), None),
        };
        if let Some((_, readable)) = TOKEN_NAMES.iter().find(|(token, _)| *token == head) {
            name = match tail {
                Some(tail) => format!("{}_{}", readable, tail),
                None => (*readable).to_string(),
            };
        }
    }

    let spaced = SEPARATORS.replace_all(&name, " ");
    let titled = title_case(spaced.trim());

    if titled.chars().count() < 2 {
        format!("Column {}", column)
    } else {
        titled
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
