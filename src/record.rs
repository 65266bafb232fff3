//! Records and record sets
//!
//! A [`Record`] is one extracted row: an insertion-ordered map from column
//! name to a scalar (string, number or null). Rows of one [`RecordSet`] may be
//! ragged; a column absent from a row is simply a missing key.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// One extracted row
pub type Record = Map<String, Value>;

static THOUSANDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("valid regex"));

/// Ordered rows plus the profile computed from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub records: Vec<Record>,
    /// Union of all row keys, in first-seen order
    pub columns: Vec<String>,
    pub row_count: usize,
    pub col_count: usize,
    pub numeric_columns: Vec<String>,
    pub text_columns: Vec<String>,
    pub source_url: Option<String>,
    pub content_type_label: String,
}

impl RecordSet {
    pub fn new(records: Vec<Record>, source_url: Option<String>, label: impl Into<String>) -> Self {
        let columns = collect_columns(&records);
        let (numeric_columns, text_columns) = type_columns(&records, &columns);

        Self {
            row_count: records.len(),
            col_count: columns.len(),
            records,
            columns,
            numeric_columns,
            text_columns,
            source_url,
            content_type_label: label.into(),
        }
    }

    pub fn empty(label: impl Into<String>) -> Self {
        Self::new(Vec::new(), None, label)
    }

    /// Rebuild the profile for a new set of rows, keeping source and label
    pub fn with_records(&self, records: Vec<Record>) -> Self {
        Self::new(records, self.source_url.clone(), self.content_type_label.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_numeric(&self, column: &str) -> bool {
        self.numeric_columns.iter().any(|c| c == column)
    }

    pub fn preview(&self, n: usize) -> &[Record] {
        &self.records[..n.min(self.records.len())]
    }
}

fn collect_columns(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// A column is numeric when it has at least one value and every non-null
/// value coerces to a number.
fn type_columns(records: &[Record], columns: &[String]) -> (Vec<String>, Vec<String>) {
    let mut numeric = Vec::new();
    let mut text = Vec::new();

    for column in columns {
        let mut present = records
            .iter()
            .filter_map(|r| r.get(column))
            .filter(|v| !v.is_null())
            .peekable();

        let is_numeric = present.peek().is_some() && present.all(|v| as_number(v).is_some());
        if is_numeric {
            numeric.push(column.clone());
        } else {
            text.push(column.clone());
        }
    }

    (numeric, text)
}

/// Parse text as a number, accepting thousands separators ("1,234.5")
pub fn coerce_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if THOUSANDS.is_match(trimmed) {
        return trimmed.replace(',', "").parse().ok();
    }
    trimmed.parse().ok()
}

/// Numeric view of a scalar value
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => coerce_number(s),
        _ => None,
    }
}

/// JSON number for a float; NaN and infinities become null
pub fn number_value(n: f64) -> Value {
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}

/// Typed value for a cell already known to be numeric.
/// Integral text stays an integer so `"10"` reads back as `10`, not `10.0`.
pub fn numeric_cell(text: &str) -> Value {
    let trimmed = text.trim();
    let plain = if THOUSANDS.is_match(trimmed) {
        trimmed.replace(',', "")
    } else {
        trimmed.to_string()
    };
    if let Ok(i) = plain.parse::<i64>() {
        return Value::from(i);
    }
    plain.parse::<f64>().map_or(Value::Null, number_value)
}

/// Null, empty string and the "-" placeholder all count as missing
pub fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let s = s.trim();
            s.is_empty() || s == "-"
        }
        _ => false,
    }
}

/// Render a scalar for display or signature purposes
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Label a table by the vocabulary of its column names
pub fn classify_columns(columns: &[String]) -> &'static str {
    let cols: HashSet<String> = columns.iter().map(|c| c.to_lowercase()).collect();
    let has_all = |names: &[&str]| names.iter().all(|n| cols.contains(*n));
    let has_any = |names: &[&str]| names.iter().any(|n| cols.contains(*n));

    if has_all(&["title", "body", "date"]) {
        "news_article_table"
    } else if has_any(&["job", "company", "location"]) {
        "job_listings_table"
    } else if has_any(&["price", "product", "name"]) {
        "product_listings_table"
    } else if has_any(&["event", "date", "location"]) {
        "event_schedule_table"
    } else if has_any(&["review", "rating", "user"]) {
        "reviews_table"
    } else if has_any(&["property", "address"]) {
        "real_estate_table"
    } else if has_any(&["profile", "username", "bio"]) {
        "social_media_profile_table"
    } else if has_any(&["forum", "post", "thread"]) {
        "forum_discussion_table"
    } else if has_any(&["image", "gallery", "caption"]) {
        "image_gallery_table"
    } else {
        "generic_table"
    }
}
