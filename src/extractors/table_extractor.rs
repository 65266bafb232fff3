//! Literal `<table>` extraction
//!
//! Each table is parsed independently: a header row of `th` cells gives the
//! column names and the remaining rows give values. Tables without a usable
//! header, or with rows wider than the header, fall back to a plain cell walk.
//! A table that yields nothing is skipped; it never fails the whole call.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::element_text;
use crate::record::{classify_columns, coerce_number, numeric_cell, Record, RecordSet};

static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid table selector"));

/// Cells of one `<tr>`
struct RawRow {
    cells: Vec<String>,
    all_header: bool,
}

/// Extract every literal table in the document as a record set
pub fn extract_tables(document: &Html, source_url: Option<&str>) -> Vec<RecordSet> {
    let mut results = Vec::new();

    for (index, table) in document.select(&TABLE).enumerate() {
        let rows = table_rows(table);
        if rows.is_empty() {
            debug!("Skipping table {}: no rows", index);
            continue;
        }

        let (columns, data) = match parse_with_header(&rows) {
            Some(parsed) => parsed,
            None => {
                debug!("Table {}: no regular header, falling back to cell walk", index);
                parse_cell_walk(&rows)
            }
        };

        let records = build_records(&columns, &data);
        if records.is_empty() && columns.is_empty() {
            debug!("Skipping table {}: nothing extractable", index);
            continue;
        }

        let label = classify_columns(&columns);
        let mut set = RecordSet::new(records, source_url.map(String::from), label);
        if set.columns.is_empty() {
            // header-only table: keep the header labels as the column list
            set.columns = columns;
            set.col_count = set.columns.len();
            set.text_columns = set.columns.clone();
        }
        results.push(set);
    }

    debug!("Extracted {} tables", results.len());
    results
}

/// Rows that belong to this table, excluding rows of nested tables
fn table_rows(table: ElementRef<'_>) -> Vec<RawRow> {
    let mut rows = Vec::new();

    for node in table.descendants() {
        let Some(tr) = ElementRef::wrap(node) else {
            continue;
        };
        if tr.value().name() != "tr" || !owned_by(tr, table) {
            continue;
        }

        let cells: Vec<ElementRef<'_>> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| matches!(c.value().name(), "td" | "th"))
            .collect();
        if cells.is_empty() {
            continue;
        }

        let in_thead = tr
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take_while(|a| a.id() != table.id())
            .any(|a| a.value().name() == "thead");

        rows.push(RawRow {
            all_header: in_thead || cells.iter().all(|c| c.value().name() == "th"),
            cells: cells.into_iter().map(element_text).collect(),
        });
    }

    rows
}

/// True when the nearest enclosing `<table>` of `tr` is `table`
fn owned_by(tr: ElementRef<'_>, table: ElementRef<'_>) -> bool {
    tr.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
        .is_some_and(|a| a.id() == table.id())
}

/// Direct parse: first row is a header row and every data row is exactly as
/// wide as the header.
fn parse_with_header(rows: &[RawRow]) -> Option<(Vec<String>, Vec<Vec<String>>)> {
    let header = rows.first()?;
    if !header.all_header || header.cells.iter().all(|c| c.is_empty()) {
        return None;
    }

    let width = header.cells.len();
    let data = &rows[1..];
    if data.iter().any(|r| r.cells.len() != width) {
        return None;
    }

    Some((
        unique_labels(&header.cells),
        data.iter().map(|r| r.cells.clone()).collect(),
    ))
}

/// Cell walk: the first row is the header when there is more than one row and
/// no data row is wider than it; otherwise every row is data under positional
/// column names.
fn parse_cell_walk(rows: &[RawRow]) -> (Vec<String>, Vec<Vec<String>>) {
    let all: Vec<Vec<String>> = rows.iter().map(|r| r.cells.clone()).collect();

    if all.len() > 1 {
        let header = &all[0];
        let fits = all[1..].iter().all(|r| r.len() <= header.len());
        if fits && header.iter().any(|c| !c.is_empty()) {
            return (unique_labels(header), all[1..].to_vec());
        }
    }

    let width = all.iter().map(Vec::len).max().unwrap_or(0);
    let columns = (1..=width).map(|i| format!("column_{}", i)).collect();
    (columns, all)
}

/// Blank labels become positional names; repeats get a running suffix
fn unique_labels(cells: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut labels = Vec::with_capacity(cells.len());

    for (i, cell) in cells.iter().enumerate() {
        let base = if cell.is_empty() {
            format!("column_{}", i + 1)
        } else {
            cell.clone()
        };
        let mut label = base.clone();
        let mut n = 2;
        while !seen.insert(label.clone()) {
            label = format!("{}_{}", base, n);
            n += 1;
        }
        labels.push(label);
    }

    labels
}

/// Zip cells onto column names, typing each column as numeric when every
/// non-empty cell parses as a number.
fn build_records(columns: &[String], data: &[Vec<String>]) -> Vec<Record> {
    let numeric: Vec<bool> = (0..columns.len())
        .map(|i| {
            let mut present = data
                .iter()
                .filter_map(|r| r.get(i))
                .filter(|c| !c.is_empty())
                .peekable();
            present.peek().is_some() && present.all(|c| coerce_number(c).is_some())
        })
        .collect();

    data.iter()
        .map(|row| {
            let mut record = Record::new();
            for (i, column) in columns.iter().enumerate() {
                let Some(cell) = row.get(i) else {
                    continue;
                };
                let value = if cell.is_empty() {
                    Value::Null
                } else if numeric[i] {
                    numeric_cell(cell)
                } else {
                    Value::String(cell.clone())
                };
                record.insert(column.clone(), value);
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_table() {
        let html = "<table><tr><th>Name</th><th>Price</th></tr>\
                    <tr><td>A</td><td>10</td></tr><tr><td>B</td><td>20</td></tr></table>";
        let tables = extract_tables(&Html::parse_document(html), None);

        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.columns, vec!["Name", "Price"]);
        assert_eq!(table.row_count, 2);
        assert_eq!(table.records[0]["Name"], json!("A"));
        assert_eq!(table.records[0]["Price"], json!(10));
        assert_eq!(table.records[1]["Price"], json!(20));
        assert_eq!(table.numeric_columns, vec!["Price"]);
        assert_eq!(table.text_columns, vec!["Name"]);
        assert_eq!(table.content_type_label, "product_listings_table");
    }

    #[test]
    fn test_thead_with_td_cells() {
        let html = r#"
        <table>
            <thead><tr><td>City</td><td>Population</td></tr></thead>
            <tbody>
                <tr><td>Oslo</td><td>709,037</td></tr>
                <tr><td>Bergen</td><td>291,940</td></tr>
            </tbody>
        </table>
        "#;
        let tables = extract_tables(&Html::parse_document(html), Some("https://example.com"));
        let table = &tables[0];
        assert_eq!(table.columns, vec!["City", "Population"]);
        assert_eq!(table.records[0]["Population"], json!(709037));
        assert_eq!(table.source_url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn test_no_header_uses_first_row() {
        let html = "<table><tr><td>Model</td><td>Year</td></tr>\
                    <tr><td>X</td><td>2020</td></tr><tr><td>Y</td></tr></table>";
        let tables = extract_tables(&Html::parse_document(html), None);
        let table = &tables[0];

        assert_eq!(table.columns, vec!["Model", "Year"]);
        assert_eq!(table.row_count, 2);
        // short row is ragged, not an error
        assert!(!table.records[1].contains_key("Year"));
        assert_eq!(table.records[0]["Year"], json!(2020));
    }

    #[test]
    fn test_single_row_is_headerless() {
        let html = "<table><tr><td>only</td><td>row</td></tr></table>";
        let tables = extract_tables(&Html::parse_document(html), None);
        let table = &tables[0];
        assert_eq!(table.columns, vec!["column_1", "column_2"]);
        assert_eq!(table.records[0]["column_1"], json!("only"));
    }

    #[test]
    fn test_wide_rows_fall_back_to_positional() {
        let html = "<table><tr><th>A</th></tr><tr><td>1</td><td>2</td></tr>\
                    <tr><td>3</td><td>4</td></tr></table>";
        let tables = extract_tables(&Html::parse_document(html), None);
        let table = &tables[0];
        assert_eq!(table.columns, vec!["column_1", "column_2"]);
        assert_eq!(table.row_count, 3);
    }

    #[test]
    fn test_mixed_column_stays_text_and_inf_is_null() {
        let html = "<table><tr><th>Code</th><th>Ratio</th></tr>\
                    <tr><td>7</td><td>inf</td></tr><tr><td>A7</td><td>0.5</td></tr></table>";
        let tables = extract_tables(&Html::parse_document(html), None);
        let table = &tables[0];
        assert_eq!(table.records[0]["Code"], json!("7"));
        assert_eq!(table.records[0]["Ratio"], Value::Null);
        assert_eq!(table.records[1]["Ratio"], json!(0.5));
        assert_eq!(table.numeric_columns, vec!["Ratio"]);
    }

    #[test]
    fn test_nested_tables_are_separate() {
        let html = r#"
        <table>
            <tr><th>Outer</th></tr>
            <tr><td>a<table><tr><th>Inner</th></tr><tr><td>b</td></tr></table></td></tr>
        </table>
        "#;
        let tables = extract_tables(&Html::parse_document(html), None);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].columns, vec!["Outer"]);
        assert_eq!(tables[0].row_count, 1);
        assert_eq!(tables[1].columns, vec!["Inner"]);
        assert_eq!(tables[1].records[0]["Inner"], json!("b"));
    }

    #[test]
    fn test_inline_markup_keeps_numbers_whole() {
        let html = "<table><tr><th>Name</th><th>Price</th></tr>\
                    <tr><td>A</td><td>1<b>0</b></td></tr>\
                    <tr><td><em>B</em>ee</td><td><span>2</span>0</td></tr></table>";
        let tables = extract_tables(&Html::parse_document(html), None);
        let table = &tables[0];
        assert_eq!(table.records[0]["Price"], json!(10));
        assert_eq!(table.records[1]["Price"], json!(20));
        assert_eq!(table.records[1]["Name"], json!("Bee"));
        assert_eq!(table.numeric_columns, vec!["Price"]);
    }

    #[test]
    fn test_duplicate_and_blank_headers() {
        let html = "<table><tr><th>Name</th><th></th><th>Name</th></tr>\
                    <tr><td>a</td><td>b</td><td>c</td></tr></table>";
        let tables = extract_tables(&Html::parse_document(html), None);
        assert_eq!(tables[0].columns, vec!["Name", "column_2", "Name_2"]);
    }

    #[test]
    fn test_empty_table_is_skipped() {
        let html = "<table></table><table><tr><th>A</th></tr><tr><td>1</td></tr></table>";
        let tables = extract_tables(&Html::parse_document(html), None);
        assert_eq!(tables.len(), 1);
    }
}
