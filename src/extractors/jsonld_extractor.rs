//! JSON-LD extraction from HTML
//!
//! Reads `<script type="application/ld+json">` blocks and flattens them into
//! records. Supports `@graph` arrays, multiple blocks, and `ItemList` payloads
//! whose elements either are the item or wrap it under `item`.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::{Map, Value};
use tracing::debug;

use crate::record::{is_missing, number_value, Record};

pub const LINKED_DATA_LABEL: &str = "linked_data";

/// Default nesting limit for flattening
pub const MAX_FLATTEN_DEPTH: usize = 16;

static JSONLD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid JSON-LD selector")
});

/// Parse every JSON-LD block in the document. Blocks that are not valid JSON
/// are skipped.
pub fn extract_linked_data_blocks(document: &Html) -> Vec<Value> {
    let mut blocks = Vec::new();

    for element in document.select(&JSONLD) {
        let text = element.text().collect::<String>();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(json) => blocks.push(json),
            Err(e) => debug!("Skipping malformed JSON-LD block: {}", e),
        }
    }

    blocks
}

/// Flatten linked-data blocks into records using the default depth limit
pub fn flatten_linked_data(blocks: &[Value]) -> Vec<Record> {
    flatten_linked_data_to_depth(blocks, MAX_FLATTEN_DEPTH)
}

/// Flatten linked-data blocks into records. Nested keys join with `_`,
/// arrays of objects get a numeric index per element, arrays of scalars are
/// comma-joined. Rows with nothing but missing values are dropped.
pub fn flatten_linked_data_to_depth(blocks: &[Value], max_depth: usize) -> Vec<Record> {
    let mut payloads = Vec::new();
    for block in blocks {
        collect_payloads(block, &mut payloads);
    }

    payloads
        .into_iter()
        .flat_map(unwrap_item_list)
        .map(|item| {
            let mut record = Record::new();
            flatten_object(item, "", 0, max_depth, &mut record);
            record
        })
        .filter(|record| record.values().any(|v| !is_missing(v)))
        .collect()
}

/// Top-level objects of a block: the block itself, the elements of a
/// top-level array, or the members of an `@graph`.
fn collect_payloads<'a>(value: &'a Value, out: &mut Vec<&'a Map<String, Value>>) {
    match value {
        Value::Array(items) => {
            for item in items {
                if let Value::Object(_) = item {
                    collect_payloads(item, out);
                }
            }
        }
        Value::Object(obj) => {
            if let Some(Value::Array(graph)) = obj.get("@graph") {
                for member in graph {
                    if let Value::Object(member) = member {
                        out.push(member);
                    }
                }
            } else {
                out.push(obj);
            }
        }
        _ => {}
    }
}

fn is_item_list(obj: &Map<String, Value>) -> bool {
    match obj.get("@type") {
        Some(Value::String(t)) => t.ends_with("ItemList"),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().is_some_and(|s| s.ends_with("ItemList"))),
        _ => false,
    }
}

/// An `ItemList` contributes one payload per element: the nested `item`
/// object when there is one, otherwise the element itself. Anything else is
/// its own payload.
fn unwrap_item_list(obj: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    if !is_item_list(obj) {
        return vec![obj];
    }

    let elements: Vec<&Value> = match obj.get("itemListElement") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    };

    elements
        .into_iter()
        .filter_map(|element| match element {
            Value::Object(element) => match element.get("item") {
                Some(Value::Object(item)) => Some(item),
                _ => Some(element),
            },
            _ => None,
        })
        .collect()
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}_{}", prefix, key)
    }
}

fn flatten_object(
    obj: &Map<String, Value>,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    out: &mut Record,
) {
    for (key, value) in obj {
        flatten_value(value, &join_key(prefix, key), depth, max_depth, out);
    }
}

fn flatten_value(value: &Value, key: &str, depth: usize, max_depth: usize, out: &mut Record) {
    match value {
        Value::Object(_) | Value::Array(_) if depth + 1 >= max_depth => {
            out.insert(key.to_string(), Value::String(value.to_string()));
        }
        Value::Object(obj) => flatten_object(obj, key, depth + 1, max_depth, out),
        Value::Array(items) => {
            if items.iter().all(Value::is_object) {
                for (i, item) in items.iter().enumerate() {
                    if let Value::Object(obj) = item {
                        flatten_object(obj, &format!("{}_{}", key, i), depth + 1, max_depth, out);
                    }
                }
            } else {
                let joined = items.iter().map(scalar_text).collect::<Vec<_>>().join(", ");
                out.insert(key.to_string(), Value::String(joined));
            }
        }
        Value::Number(n) => {
            let sanitized = n.as_f64().map_or(Value::Null, |f| {
                if f.is_finite() {
                    Value::Number(n.clone())
                } else {
                    number_value(f)
                }
            });
            out.insert(key.to_string(), sanitized);
        }
        Value::Bool(b) => {
            out.insert(key.to_string(), Value::String(b.to_string()));
        }
        Value::String(s) => {
            out.insert(key.to_string(), Value::String(s.clone()));
        }
        Value::Null => {
            out.insert(key.to_string(), Value::Null);
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
