//! Repeated-structure ("grid") extraction
//!
//! Finds implicit tables in markup that has no `<table>`: product cards,
//! ranking rows, search results. Three strategies are tried in order and the
//! first one that yields enough rows and columns wins:
//!
//! 1. group class-bearing containers by structural signature and take the
//!    largest group;
//! 2. try well-known listing class fragments (`row`, `item`, `card`, ...) and
//!    rows outside any table;
//! 3. group every text-bearing element in the document by signature.
//!
//! Tables and everything inside them belong to the table extractor and are
//! never read as a grid. Finding no grid is a normal outcome and yields an
//! empty record set.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::{element_text, first_attr};
use crate::record::{display_value, is_missing, Record, RecordSet};
use crate::signature::{group_by_signature, largest_group, Shape};

pub const GRID_LABEL: &str = "grid";

const CONTAINER_TAGS: &[&str] = &["div", "li", "article", "section"];

const NON_CONTENT_TAGS: &[&str] = &[
    "html", "head", "body", "script", "style", "noscript", "template", "title", "meta", "link",
];

const FALLBACK_ATTRS: &[&str] = &["href", "src", "alt", "title"];

const TEXT_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "p", "span"];

static LISTING_PATTERNS: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
    [
        "div[class*='row']",
        "div[class*='item']",
        "div[class*='card']",
        "div[class*='listing']",
        "div[class*='product']",
        "div[class*='result']",
        "li[class*='item']",
        "tr",
        "div[class*='entry']",
        "div[class*='post']",
        "div[class*='article']",
    ]
    .into_iter()
    .map(|css| (css, Selector::parse(css).expect("valid listing selector")))
    .collect()
});

/// Acceptance thresholds for a candidate grid
#[derive(Debug, Clone, Copy)]
pub struct GridThresholds {
    pub min_rows: usize,
    pub min_columns: usize,
}

impl GridThresholds {
    fn accepts(&self, rows: &[Record]) -> bool {
        rows.len() >= self.min_rows && distinct_keys(rows) >= self.min_columns
    }
}

type Strategy = fn(&Html, GridThresholds) -> Option<Vec<Record>>;

/// Strategies in precedence order
const STRATEGIES: &[(&str, Strategy)] = &[
    ("container_signature", by_container_signature),
    ("listing_patterns", by_listing_patterns),
    ("text_signature", by_text_signature),
];

/// Extract the dominant repeated structure of a document as records
pub fn extract_grid(document: &Html, min_rows: usize, min_columns: usize) -> RecordSet {
    let thresholds = GridThresholds {
        min_rows: min_rows.max(1),
        min_columns: min_columns.max(1),
    };

    for (name, strategy) in STRATEGIES {
        if let Some(rows) = strategy(document, thresholds) {
            let before = rows.len();
            let rows = dedupe_rows(rows);
            debug!(
                "Grid strategy '{}' matched {} rows ({} after dedupe)",
                name,
                before,
                rows.len()
            );
            return RecordSet::new(rows, None, GRID_LABEL);
        }
        debug!("Grid strategy '{}' found nothing", name);
    }

    RecordSet::empty(GRID_LABEL)
}

/// Strategy 1: class-bearing containers grouped by signature
fn by_container_signature(document: &Html, thresholds: GridThresholds) -> Option<Vec<Record>> {
    let containers = grid_elements(document).filter(|el| {
        CONTAINER_TAGS.contains(&el.value().name()) && el.value().classes().next().is_some()
    });

    let (signature, members) = largest_group(group_by_signature(containers))?;
    if members.len() < thresholds.min_rows {
        return None;
    }
    debug!("Largest container group {} has {} members", signature, members.len());

    let rows = members.into_iter().filter_map(child_row).collect::<Vec<_>>();
    thresholds.accepts(&rows).then_some(rows)
}

/// Strategy 2: generic listing class fragments, first acceptable pattern wins
fn by_listing_patterns(document: &Html, thresholds: GridThresholds) -> Option<Vec<Record>> {
    for (css, selector) in LISTING_PATTERNS.iter() {
        let elements: Vec<ElementRef<'_>> =
            document.select(selector).filter(|el| !in_table(*el)).collect();
        if elements.len() < thresholds.min_rows {
            continue;
        }

        let rows = elements.into_iter().filter_map(comprehensive_row).collect::<Vec<_>>();
        if thresholds.accepts(&rows) {
            debug!("Listing pattern '{}' produced {} rows", css, rows.len());
            return Some(rows);
        }
    }
    None
}

/// Strategy 3: any text-bearing element grouped by signature
fn by_text_signature(document: &Html, thresholds: GridThresholds) -> Option<Vec<Record>> {
    let candidates = grid_elements(document)
        .filter(|el| !NON_CONTENT_TAGS.contains(&el.value().name()))
        .filter(|el| !element_text(*el).is_empty());

    let (_, members) = largest_group(group_by_signature(candidates))?;
    if members.len() < thresholds.min_rows {
        return None;
    }

    let rows = members.into_iter().filter_map(comprehensive_row).collect::<Vec<_>>();
    thresholds.accepts(&rows).then_some(rows)
}

/// Cheap presence check used by the classifier: some non-trivial signature
/// repeats at least `min_rows` times, or a listing class fragment does.
pub(crate) fn has_repeated_structure(document: &Html, min_rows: usize) -> bool {
    let elements =
        grid_elements(document).filter(|el| !NON_CONTENT_TAGS.contains(&el.value().name()));

    let repeated = group_by_signature(elements)
        .iter()
        .any(|(sig, members)| !sig.is_trivial() && members.len() >= min_rows);
    if repeated {
        return true;
    }

    LISTING_PATTERNS.iter().any(|(_, selector)| {
        document.select(selector).filter(|el| !in_table(*el)).count() >= min_rows
    })
}

/// Every element of the document that is neither a table nor inside one
fn grid_elements(document: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| !in_table(*el))
}

fn in_table(element: ElementRef<'_>) -> bool {
    element.value().name() == "table"
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|a| a.value().name() == "table")
}

/// Row assembly with collision-safe column names
#[derive(Default)]
struct RowBuilder {
    record: Record,
}

impl RowBuilder {
    /// Insert under `key`, or `key_2`, `key_3`, ... when taken
    fn insert(&mut self, key: &str, value: String) {
        let mut name = key.to_string();
        let mut n = 2;
        while self.record.contains_key(&name) {
            name = format!("{}_{}", key, n);
            n += 1;
        }
        self.record.insert(name, Value::String(value));
    }

    fn finish(self) -> Option<Record> {
        (!self.record.is_empty()).then_some(self.record)
    }
}

/// Row from direct children (class-or-tag key, text or link/media attribute
/// value) plus nested harvest. Falls back to the row's own text.
fn child_row(row: ElementRef<'_>) -> Option<Record> {
    let mut builder = RowBuilder::default();
    add_child_columns(row, &mut builder);
    harvest_nested(row, &mut builder);

    if builder.record.is_empty() {
        let text = element_text(row);
        if !text.is_empty() {
            builder.insert("text", text);
        }
    }
    builder.finish()
}

/// Row from the element's own text and attributes, its direct children and
/// the nested harvest.
fn comprehensive_row(row: ElementRef<'_>) -> Option<Record> {
    let mut builder = RowBuilder::default();

    let text = element_text(row);
    if !text.is_empty() {
        builder.insert("text", text);
    }
    for (name, value) in row.value().attrs() {
        if matches!(name, "class" | "style") || value.trim().is_empty() {
            continue;
        }
        builder.insert(&format!("attr_{}", name), value.trim().to_string());
    }

    add_child_columns(row, &mut builder);
    harvest_nested(row, &mut builder);
    builder.finish()
}

fn add_child_columns(row: ElementRef<'_>, builder: &mut RowBuilder) {
    for child in row.children().filter_map(ElementRef::wrap) {
        if NON_CONTENT_TAGS.contains(&child.value().name()) {
            continue;
        }
        let key = Shape::of(child).key();
        let mut value = element_text(child);
        if value.is_empty() {
            value = first_attr(child, FALLBACK_ATTRS).unwrap_or_default().to_string();
        }
        if !value.is_empty() {
            builder.insert(&key, value);
        }
    }
}

/// Typed sub-columns: headings, paragraphs and spans among the direct
/// children, links and images anywhere below the row. Indexed from 1 when a
/// row has several of the same kind.
fn harvest_nested(row: ElementRef<'_>, builder: &mut RowBuilder) {
    for tag in TEXT_TAGS {
        let texts: Vec<String> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| c.value().name() == *tag)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect();
        let several = texts.len() > 1;
        for (i, text) in texts.into_iter().enumerate() {
            let key = if several {
                format!("{}_{}", tag, i + 1)
            } else {
                (*tag).to_string()
            };
            builder.insert(&key, text);
        }
    }

    let below: Vec<ElementRef<'_>> = row
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .collect();

    let links: Vec<ElementRef<'_>> = below
        .iter()
        .copied()
        .filter(|el| el.value().name() == "a" && el.value().attr("href").is_some())
        .collect();
    let several = links.len() > 1;
    for (i, link) in links.into_iter().enumerate() {
        let prefix = indexed("link", i, several);
        if let Some(href) = first_attr(link, &["href"]) {
            builder.insert(&format!("{}_url", prefix), href.to_string());
        }
        let text = element_text(link);
        if !text.is_empty() {
            builder.insert(&format!("{}_text", prefix), text);
        }
    }

    let images: Vec<ElementRef<'_>> = below
        .iter()
        .copied()
        .filter(|el| el.value().name() == "img")
        .collect();
    let several = images.len() > 1;
    for (i, image) in images.into_iter().enumerate() {
        let prefix = indexed("image", i, several);
        if let Some(src) = first_attr(image, &["src", "data-src"]) {
            builder.insert(&format!("{}_src", prefix), src.to_string());
        }
        if let Some(alt) = first_attr(image, &["alt"]) {
            builder.insert(&format!("{}_alt", prefix), alt.to_string());
        }
    }
}

fn indexed(kind: &str, i: usize, several: bool) -> String {
    if several {
        format!("{}_{}", kind, i + 1)
    } else {
        kind.to_string()
    }
}

fn distinct_keys(rows: &[Record]) -> usize {
    rows.iter()
        .flat_map(|r| r.keys())
        .collect::<HashSet<_>>()
        .len()
}

/// Drop rows whose joined non-missing values repeat an earlier row's,
/// keeping the first occurrence.
pub fn dedupe_rows(rows: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row_signature(row)))
        .collect()
}

fn row_signature(row: &Record) -> String {
    row.values()
        .filter(|v| !is_missing(v))
        .map(display_value)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RANKINGS: &str = r#"
    <html><body>
    <div class="container">
        <h1>World University Rankings</h1>
        <div class="ranking-item">
            <div class="rank-position">1</div>
            <div class="university-name">Massachusetts Institute of Technology</div>
            <div class="country">United States</div>
            <div class="score">100.0</div>
        </div>
        <div class="ranking-item">
            <div class="rank-position">2</div>
            <div class="university-name">Stanford University</div>
            <div class="country">United States</div>
            <div class="score">98.4</div>
        </div>
        <div class="ranking-item">
            <div class="rank-position">3</div>
            <div class="university-name">Harvard University</div>
            <div class="country">United States</div>
            <div class="score">97.8</div>
        </div>
        <div class="ranking-item">
            <div class="rank-position">4</div>
            <div class="university-name">University of Oxford</div>
            <div class="country">United Kingdom</div>
            <div class="score">96.2</div>
        </div>
    </div>
    </body></html>
    "#;

    #[test]
    fn test_container_signature_grid() {
        let grid = extract_grid(&Html::parse_document(RANKINGS), 3, 1);

        assert_eq!(grid.row_count, 4);
        assert_eq!(
            grid.columns,
            vec!["rank-position", "university-name", "country", "score"]
        );
        assert_eq!(grid.records[1]["university-name"], json!("Stanford University"));
        assert_eq!(grid.numeric_columns, vec!["rank-position", "score"]);
        assert_eq!(grid.content_type_label, GRID_LABEL);
    }

    #[test]
    fn test_product_cards_harvest_links_and_images() {
        let html = r#"
        <div class="product-grid">
            <div class="product-card">
                <div class="product-image"><img src="/img/1.jpg" alt="Laptop"></div>
                <h2 class="product-title">MacBook Pro</h2>
                <div class="product-price">$2,499</div>
                <a class="more" href="/p/1">Details</a>
            </div>
            <div class="product-card">
                <div class="product-image"><img src="/img/2.jpg" alt="Phone"></div>
                <h2 class="product-title">iPhone</h2>
                <div class="product-price">$999</div>
                <a class="more" href="/p/2">Details</a>
            </div>
            <div class="product-card">
                <div class="product-image"><img src="/img/3.jpg" alt="Tablet"></div>
                <h2 class="product-title">iPad</h2>
                <div class="product-price">$799</div>
                <a class="more" href="/p/3">Details</a>
            </div>
        </div>
        "#;
        let grid = extract_grid(&Html::parse_document(html), 3, 1);

        assert_eq!(grid.row_count, 3);
        let first = &grid.records[0];
        assert_eq!(first["product-title"], json!("MacBook Pro"));
        assert_eq!(first["product-price"], json!("$2,499"));
        // empty image wrapper falls back to nothing; image harvested instead
        assert_eq!(first["image_src"], json!("/img/1.jpg"));
        assert_eq!(first["image_alt"], json!("Laptop"));
        assert_eq!(first["link_url"], json!("/p/1"));
        // typed columns are kept even when a class-keyed child holds the same text
        assert_eq!(first["h2"], json!("MacBook Pro"));
        assert_eq!(first["link_text"], json!("Details"));
    }

    #[test]
    fn test_unrecognized_heading_class_still_gives_heading_column() {
        let html = r#"
        <div class="card"><h2 class="hd">Alpha</h2><a class="go" href="/a">Alpha</a></div>
        <div class="card"><h2 class="hd">Beta</h2><a class="go" href="/b">Beta</a></div>
        <div class="card"><h2 class="hd">Gamma</h2><a class="go" href="/c">Gamma</a></div>
        "#;
        let grid = extract_grid(&Html::parse_document(html), 3, 1);

        assert_eq!(grid.row_count, 3);
        let row = &grid.records[1];
        assert_eq!(row["hd"], json!("Beta"));
        assert_eq!(row["h2"], json!("Beta"));
        assert_eq!(row["link_url"], json!("/b"));
        assert_eq!(row["link_text"], json!("Beta"));
    }

    #[test]
    fn test_table_rows_are_not_a_grid() {
        let html = "<table><tr><th>Name</th><th>Price</th></tr>\
                    <tr><td>A</td><td>10</td></tr><tr><td>B</td><td>20</td></tr>\
                    <tr><td>C</td><td>30</td></tr></table>";
        let document = Html::parse_document(html);

        assert!(extract_grid(&document, 3, 1).is_empty());
        assert!(!has_repeated_structure(&document, 3));
    }

    #[test]
    fn test_cards_beside_a_table_ignore_its_cells() {
        let html = r#"
        <table><tr><td class="item">1</td><td class="item">2</td><td class="item">3</td>
        <td class="item">4</td></tr></table>
        <div class="item"><span class="n">a</span></div>
        <div class="item"><span class="n">b</span></div>
        <div class="item"><span class="n">c</span></div>
        "#;
        let grid = extract_grid(&Html::parse_document(html), 3, 1);

        assert_eq!(grid.row_count, 3);
        assert_eq!(grid.records[0]["n"], json!("a"));
    }

    #[test]
    fn test_child_attribute_fallback() {
        let html = r#"
        <ul>
            <li class="tile"><a class="go" href="/a"></a><span class="n">A</span></li>
            <li class="tile"><a class="go" href="/b"></a><span class="n">B</span></li>
            <li class="tile"><a class="go" href="/c"></a><span class="n">C</span></li>
        </ul>
        "#;
        let grid = extract_grid(&Html::parse_document(html), 3, 1);
        assert_eq!(grid.records[2]["go"], json!("/c"));
        assert_eq!(grid.records[2]["n"], json!("C"));
    }

    #[test]
    fn test_column_collisions_get_suffix() {
        let html = r#"
        <div class="row"><span class="v">1</span><span class="v">2</span></div>
        <div class="row"><span class="v">3</span><span class="v">4</span></div>
        <div class="row"><span class="v">5</span><span class="v">6</span></div>
        "#;
        let grid = extract_grid(&Html::parse_document(html), 3, 1);
        assert_eq!(grid.records[0]["v"], json!("1"));
        assert_eq!(grid.records[0]["v_2"], json!("2"));
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let html = r#"
        <div class="entry"><p class="t">alpha</p></div>
        <div class="entry"><p class="t">beta</p></div>
        <div class="entry"><p class="t">alpha</p></div>
        <div class="entry"><p class="t">gamma</p></div>
        <div class="entry"><p class="t">beta</p></div>
        "#;
        let grid = extract_grid(&Html::parse_document(html), 3, 1);

        assert_eq!(grid.row_count, 3);
        let titles: Vec<&Value> = grid.records.iter().map(|r| &r["t"]).collect();
        assert_eq!(titles, vec![&json!("alpha"), &json!("beta"), &json!("gamma")]);
    }

    #[test]
    fn test_listing_pattern_fallback() {
        // rows differ in structure, so no signature group reaches three
        let html = r#"
        <div class="result-a"><b>One</b></div>
        <div class="result-b"><i>Two</i></div>
        <div class="result-c"><u>Three</u><em>!</em></div>
        "#;
        let grid = extract_grid(&Html::parse_document(html), 3, 1);
        assert_eq!(grid.row_count, 3);
        assert_eq!(grid.records[0]["text"], json!("One"));
        assert_eq!(grid.records[0]["b"], json!("One"));
        assert!(!grid.records[0].contains_key("attr_class"));
    }

    #[test]
    fn test_text_signature_fallback() {
        let html = r#"
        <section>
            <p>First paragraph</p>
            <p>Second paragraph</p>
            <p>Third paragraph</p>
        </section>
        "#;
        let grid = extract_grid(&Html::parse_document(html), 3, 1);
        assert_eq!(grid.row_count, 3);
        assert_eq!(grid.records[2]["text"], json!("Third paragraph"));
    }

    #[test]
    fn test_no_grid_is_empty_not_error() {
        let html = "<html><body><p>Just one paragraph.</p></body></html>";
        let grid = extract_grid(&Html::parse_document(html), 3, 1);
        assert!(grid.is_empty());
        assert_eq!(grid.row_count, 0);
        assert!(grid.columns.is_empty());
    }

    #[test]
    fn test_min_columns_rejects_thin_grids() {
        let html = r#"
        <div class="card"><p class="t">a</p></div>
        <div class="card"><p class="t">b</p></div>
        <div class="card"><p class="t">c</p></div>
        "#;
        let grid = extract_grid(&Html::parse_document(html), 3, 1);
        assert_eq!(grid.row_count, 3);

        // strategy 1 yields "t" and "p", the listing pattern adds "text"
        let wide = extract_grid(&Html::parse_document(html), 3, 3);
        assert_eq!(wide.row_count, 3);
        assert!(wide.columns.contains(&"text".to_string()));
    }
}
