//! Content-type classification
//!
//! Independent probes each look for one structural marker. Every probe that
//! fires contributes its type; a page where nothing fires is `Unknown`.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extractors::has_repeated_structure;

/// Rows needed before repeated structure counts as a grid
pub const GRID_MIN_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Table,
    RepeatedGrid,
    Article,
    LinkedData,
    ProductListing,
    JobListing,
    Review,
    RealEstate,
    Profile,
    Unknown,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid classifier selector")
}

static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static ARTICLE: LazyLock<Selector> = LazyLock::new(|| {
    selector(
        "article, [role='article'], meta[property='og:article'], \
         meta[property='og:type'][content='article']",
    )
});
static LINKED_DATA: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"script[type="application/ld+json"]"#));
static PRODUCT: LazyLock<Selector> =
    LazyLock::new(|| selector("div[class*='product'], .product-card, .product-item"));
static JOB: LazyLock<Selector> =
    LazyLock::new(|| selector("div[class*='job'], .job-card, .job-listing"));
static REVIEW: LazyLock<Selector> =
    LazyLock::new(|| selector("div[class*='review'], .review-card, blockquote"));
static REAL_ESTATE: LazyLock<Selector> =
    LazyLock::new(|| selector("div[class*='property'], .real-estate, .listing"));
static FORM_INPUT: LazyLock<Selector> =
    LazyLock::new(|| selector("form input, form textarea, form select"));

fn present(document: &Html, selector: &Selector) -> bool {
    document.select(selector).next().is_some()
}

/// Every content type present in the document
pub fn classify(document: &Html) -> BTreeSet<ContentType> {
    let probes: [(ContentType, bool); 9] = [
        (ContentType::Table, present(document, &TABLE)),
        (
            ContentType::RepeatedGrid,
            has_repeated_structure(document, GRID_MIN_ROWS),
        ),
        (ContentType::Article, present(document, &ARTICLE)),
        (ContentType::LinkedData, present(document, &LINKED_DATA)),
        (ContentType::ProductListing, present(document, &PRODUCT)),
        (ContentType::JobListing, present(document, &JOB)),
        (ContentType::Review, present(document, &REVIEW)),
        (ContentType::RealEstate, present(document, &REAL_ESTATE)),
        (ContentType::Profile, present(document, &FORM_INPUT)),
    ];

    let mut types: BTreeSet<ContentType> = probes
        .into_iter()
        .filter_map(|(kind, fired)| fired.then_some(kind))
        .collect();

    if types.is_empty() {
        types.insert(ContentType::Unknown);
    }
    debug!("Classified document as {:?}", types);
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(html: &str) -> BTreeSet<ContentType> {
        classify(&Html::parse_document(html))
    }

    #[test]
    fn test_table_and_linked_data() {
        let types = kinds(
            r#"<html><head><script type="application/ld+json">{"@type":"Thing"}</script></head>
            <body><table><tr><td>1</td></tr></table></body></html>"#,
        );
        assert!(types.contains(&ContentType::Table));
        assert!(types.contains(&ContentType::LinkedData));
        assert!(!types.contains(&ContentType::Unknown));
    }

    #[test]
    fn test_repeated_cards_are_grid_and_products() {
        let types = kinds(
            r#"<div class="product-card"><h2>A</h2><span>1</span></div>
               <div class="product-card"><h2>B</h2><span>2</span></div>
               <div class="product-card"><h2>C</h2><span>3</span></div>"#,
        );
        assert!(types.contains(&ContentType::RepeatedGrid));
        assert!(types.contains(&ContentType::ProductListing));
    }

    #[test]
    fn test_two_repeats_are_not_a_grid() {
        let types = kinds(r#"<div class="card"><p>A</p></div><div class="card"><p>B</p></div>"#);
        assert!(!types.contains(&ContentType::RepeatedGrid));
    }

    #[test]
    fn test_article_markers() {
        assert!(kinds("<article><p>Story</p></article>").contains(&ContentType::Article));
        assert!(kinds(r#"<head><meta property="og:type" content="article"></head>"#)
            .contains(&ContentType::Article));
    }

    #[test]
    fn test_profile_needs_input_inside_form() {
        assert!(kinds(r#"<form><input name="q"></form>"#).contains(&ContentType::Profile));
        assert!(!kinds(r#"<form></form><input name="q">"#).contains(&ContentType::Profile));
    }

    #[test]
    fn test_listing_subtypes() {
        let types = kinds(
            r#"<div class="job-card">Dev</div><blockquote>Great</blockquote>
               <div class="property-tile">Flat</div>"#,
        );
        assert!(types.contains(&ContentType::JobListing));
        assert!(types.contains(&ContentType::Review));
        assert!(types.contains(&ContentType::RealEstate));
    }

    #[test]
    fn test_empty_or_garbage_is_unknown() {
        let expected: BTreeSet<_> = [ContentType::Unknown].into_iter().collect();
        assert_eq!(kinds(""), expected);
        assert_eq!(kinds("<<<>>> not really markup"), expected);
    }
}
