//! Row filtering and ranking
//!
//! Narrows a matched record set to what a question needs: threshold filter on
//! the first matched column, descending sort for comparison questions, column
//! projection and a top-N cut.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::query::{extract_threshold, IntentTag};
use crate::record::{as_number, display_value, Record, RecordSet};

/// Filter, sort, project and truncate `set` for a question.
///
/// `columns` are the matched columns, most relevant first. Every step
/// degrades to a no-op when its input is missing: no threshold or a
/// non-numeric first column leaves rows unfiltered, no matched column keeps
/// every column. `top_n == 0` keeps every row.
pub fn filter_and_rank(
    set: &RecordSet,
    columns: &[String],
    intents: &[IntentTag],
    query: &str,
    top_n: usize,
) -> RecordSet {
    let mut rows: Vec<Record> = set.records.clone();
    let lead = columns.first().filter(|c| set.is_numeric(c));

    if let (Some(threshold), Some(column)) = (extract_threshold(query), lead) {
        let before = rows.len();
        rows.retain(|row| {
            row.get(column)
                .and_then(as_number)
                .is_some_and(|v| threshold.operator.holds(v, threshold.value))
        });
        debug!(
            "Threshold {} {} on '{}' kept {} of {} rows",
            threshold.operator,
            threshold.value,
            column,
            rows.len(),
            before
        );
    }

    if let Some(column) = lead.filter(|_| intents.contains(&IntentTag::Comparison)) {
        rows.sort_by(|a, b| {
            descending(
                a.get(column).and_then(as_number),
                b.get(column).and_then(as_number),
            )
        });
    }

    let keep = projection(set, columns);
    if !keep.is_empty() {
        rows = rows.into_iter().map(|row| project(&row, &keep)).collect();
    }

    if top_n > 0 {
        rows.truncate(top_n);
    }

    set.with_records(rows)
}

/// Larger numbers first, missing values last
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Matched columns present in the set, plus the set's first text column when
/// none of them is text. Empty when nothing matched.
fn projection(set: &RecordSet, columns: &[String]) -> Vec<String> {
    let mut keep: Vec<String> = columns
        .iter()
        .filter(|c| set.columns.contains(c))
        .cloned()
        .collect();
    if keep.is_empty() {
        return keep;
    }

    if keep.iter().all(|c| set.is_numeric(c)) {
        if let Some(text) = set.text_columns.first() {
            keep.push(text.clone());
        }
    }
    keep
}

fn project(row: &Record, keep: &[String]) -> Record {
    keep.iter()
        .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
        .collect()
}

/// One condition of [`filter_records`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Numeric value within `[min, max]`
    Range { min: f64, max: f64 },
    /// Numeric value at least this large
    AtLeast(f64),
    /// Case-insensitive substring
    Contains(String),
}

impl Criterion {
    fn accepts(&self, value: &serde_json::Value) -> bool {
        match self {
            Criterion::Range { min, max } => {
                as_number(value).is_some_and(|v| *min <= v && v <= *max)
            }
            Criterion::AtLeast(min) => as_number(value).is_some_and(|v| v >= *min),
            Criterion::Contains(needle) => display_value(value)
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }
}

/// Rows satisfying every criterion; a row missing a criterion's column fails
pub fn filter_records(records: &[Record], criteria: &BTreeMap<String, Criterion>) -> Vec<Record> {
    records
        .iter()
        .filter(|row| {
            criteria
                .iter()
                .all(|(column, criterion)| row.get(column).is_some_and(|v| criterion.accepts(v)))
        })
        .cloned()
        .collect()
}
