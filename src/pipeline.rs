//! End-to-end flows: extract everything from one page, narrow it to one
//! question, and the fetch-extract-narrow-ask round trip.

use std::collections::{BTreeMap, BTreeSet};

use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::classifier::{classify, ContentType};
use crate::config::{ExtractionConfig, NarrowConfig};
use crate::error::Result;
use crate::extractors::{
    extract_article, extract_grid, extract_linked_data_blocks, extract_tables,
    flatten_linked_data_to_depth, strip_boilerplate, ArticleContent, LINKED_DATA_LABEL,
};
use crate::fetch::{FetchMethod, PageFetcher};
use crate::llm::LanguageModel;
use crate::matcher::{match_best_table, match_columns};
use crate::narrower::filter_and_rank;
use crate::normalizer::{normalize_record_set, suggest_display_names};
use crate::prompt::build_prompt;
use crate::query::{IntentTag, QueryIntent, Threshold};
use crate::record::RecordSet;

pub const NO_DATA_MESSAGE: &str = "No tables found on this page.";
pub const NO_MATCH_MESSAGE: &str = "No suitable table found for your question.";

/// Suggested display names per extracted record set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMappings {
    pub tables: Vec<BTreeMap<String, String>>,
    pub grid: BTreeMap<String, String>,
    pub linked_data: BTreeMap<String, String>,
}

/// Everything extracted from one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source_url: Option<String>,
    pub content_types: BTreeSet<ContentType>,
    pub tables: Vec<RecordSet>,
    pub grid: RecordSet,
    pub linked_data: RecordSet,
    /// Parsed JSON-LD blocks as found in the page
    pub linked_data_blocks: Vec<Value>,
    pub article: Option<ArticleContent>,
    pub column_mappings: ColumnMappings,
}

impl ExtractionResult {
    pub fn article_text(&self) -> Option<&str> {
        self.article.as_ref().map(|a| a.text.as_str())
    }

    /// Record sets a question can be matched against, in join order:
    /// tables, linked data, grid.
    pub fn candidates(&self) -> Vec<RecordSet> {
        let mut candidates: Vec<RecordSet> = self
            .tables
            .iter()
            .filter(|t| !t.columns.is_empty())
            .cloned()
            .collect();
        if !self.linked_data.is_empty() {
            candidates.push(self.linked_data.clone());
        }
        if !self.grid.is_empty() {
            candidates.push(self.grid.clone());
        }
        candidates
    }
}

/// Extract with the default configuration
pub fn extract(html: &str, source_url: Option<&str>) -> ExtractionResult {
    extract_with_config(html, source_url, &ExtractionConfig::default())
}

pub fn extract_with_config(
    html: &str,
    source_url: Option<&str>,
    config: &ExtractionConfig,
) -> ExtractionResult {
    let document = prepare(html, config);
    let content_types = classify(&document);

    let extracted = run_extractors(html, &document, &content_types, config, source_url);

    let article = if content_types.contains(&ContentType::Article) {
        extract_article(html, source_url)
    } else {
        None
    };

    let finish = |set: RecordSet| {
        if config.normalize_fields {
            normalize_record_set(&set)
        } else {
            set
        }
    };
    let tables: Vec<RecordSet> = extracted.tables.into_iter().map(finish).collect();
    let grid = finish(extracted.grid);
    let linked_data = finish(extracted.linked_data);

    let column_mappings = ColumnMappings {
        tables: tables.iter().map(suggest_display_names).collect(),
        grid: suggest_display_names(&grid),
        linked_data: suggest_display_names(&linked_data),
    };

    info!(
        "Extracted {} tables, {} grid rows, {} linked-data rows from {}",
        tables.len(),
        grid.row_count,
        linked_data.row_count,
        source_url.unwrap_or("<inline html>")
    );

    ExtractionResult {
        source_url: source_url.map(String::from),
        content_types,
        tables,
        grid,
        linked_data,
        linked_data_blocks: extracted.linked_data_blocks,
        article,
        column_mappings,
    }
}

/// Parsed document, with boilerplate removed when configured
fn prepare(html: &str, config: &ExtractionConfig) -> Html {
    let document = Html::parse_document(html);
    if config.strip_boilerplate {
        strip_boilerplate(&document)
    } else {
        document
    }
}

/// Raw output of the independent extractors
struct Extracted {
    tables: Vec<RecordSet>,
    linked_data_blocks: Vec<Value>,
    linked_data: RecordSet,
    grid: RecordSet,
}

fn tables_of(
    document: &Html,
    types: &BTreeSet<ContentType>,
    source_url: Option<&str>,
) -> Vec<RecordSet> {
    if types.contains(&ContentType::Table) {
        extract_tables(document, source_url)
    } else {
        Vec::new()
    }
}

fn linked_data_of(
    document: &Html,
    config: &ExtractionConfig,
    source_url: Option<&str>,
) -> (Vec<Value>, RecordSet) {
    let blocks = extract_linked_data_blocks(document);
    let records = flatten_linked_data_to_depth(&blocks, config.max_linked_data_depth);
    let set = RecordSet::new(records, source_url.map(String::from), LINKED_DATA_LABEL);
    (blocks, set)
}

fn grid_of(document: &Html, config: &ExtractionConfig, source_url: Option<&str>) -> RecordSet {
    let mut grid = extract_grid(document, config.min_rows, config.min_columns);
    grid.source_url = source_url.map(String::from);
    grid
}

fn run_sequential(
    document: &Html,
    types: &BTreeSet<ContentType>,
    config: &ExtractionConfig,
    source_url: Option<&str>,
) -> Extracted {
    let tables = tables_of(document, types, source_url);
    let (linked_data_blocks, linked_data) = linked_data_of(document, config, source_url);
    let grid = grid_of(document, config, source_url);
    Extracted {
        tables,
        linked_data_blocks,
        linked_data,
        grid,
    }
}

/// Run the extractors on worker threads. Parsed trees cannot cross threads,
/// so every worker parses its own copy of the markup.
#[cfg(feature = "parallel")]
fn run_extractors(
    html: &str,
    document: &Html,
    types: &BTreeSet<ContentType>,
    config: &ExtractionConfig,
    source_url: Option<&str>,
) -> Extracted {
    if !config.parallel {
        return run_sequential(document, types, config, source_url);
    }

    debug!("Running extractors in parallel");
    let (tables, ((linked_data_blocks, linked_data), grid)) = rayon::join(
        || tables_of(&prepare(html, config), types, source_url),
        || {
            rayon::join(
                || linked_data_of(&prepare(html, config), config, source_url),
                || grid_of(&prepare(html, config), config, source_url),
            )
        },
    );

    Extracted {
        tables,
        linked_data_blocks,
        linked_data,
        grid,
    }
}

#[cfg(not(feature = "parallel"))]
fn run_extractors(
    _html: &str,
    document: &Html,
    types: &BTreeSet<ContentType>,
    config: &ExtractionConfig,
    source_url: Option<&str>,
) -> Extracted {
    debug!("Running extractors sequentially");
    run_sequential(document, types, config, source_url)
}

/// The part of a page relevant to one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrowResult {
    pub intent_tags: Vec<IntentTag>,
    pub threshold: Option<Threshold>,
    pub keywords: Vec<String>,
    pub selected_columns: Vec<String>,
    /// `None` when nothing relevant was found; see `message`
    pub records: Option<RecordSet>,
    pub message: Option<String>,
}

impl NarrowResult {
    fn no_match(intent: QueryIntent, message: &str) -> Self {
        Self {
            intent_tags: intent.tags,
            threshold: intent.threshold,
            keywords: intent.keywords,
            selected_columns: Vec::new(),
            records: None,
            message: Some(message.to_string()),
        }
    }
}

/// Narrow extracted results to a question, keeping at most `top_n` rows
pub fn narrow(results: &ExtractionResult, query: &str, top_n: usize) -> NarrowResult {
    let config = NarrowConfig {
        top_n,
        ..NarrowConfig::default()
    };
    narrow_with_config(results, query, &config)
}

pub fn narrow_with_config(
    results: &ExtractionResult,
    query: &str,
    config: &NarrowConfig,
) -> NarrowResult {
    let intent = QueryIntent::parse(query);
    debug!("Query intents {:?}, keywords {:?}", intent.tags, intent.keywords);

    let candidates = results.candidates();
    if candidates.is_empty() {
        return NarrowResult::no_match(intent, NO_DATA_MESSAGE);
    }

    let Some(best) = match_best_table(&candidates, &intent.keywords, config.match_cutoff) else {
        return NarrowResult::no_match(intent, NO_MATCH_MESSAGE);
    };

    let columns = match_columns(best, &intent.keywords, config.match_cutoff);
    let narrowed = filter_and_rank(best, &columns, &intent.tags, query, config.top_n);
    info!(
        "Selected {} set ({} rows), columns {:?}, {} rows after narrowing",
        best.content_type_label,
        best.row_count,
        columns,
        narrowed.row_count
    );

    NarrowResult {
        intent_tags: intent.tags,
        threshold: intent.threshold,
        keywords: intent.keywords,
        selected_columns: columns,
        records: Some(narrowed),
        message: None,
    }
}

/// Fetch a page, narrow it to the question and ask the model about the
/// narrowed records. When nothing relevant is found the explanation is
/// returned without calling the model.
pub fn ask(
    fetcher: &dyn PageFetcher,
    model: &dyn LanguageModel,
    url: &str,
    method: FetchMethod,
    question: &str,
    top_n: usize,
) -> Result<String> {
    let html = fetcher.fetch(url, method)?;
    let results = extract(&html, Some(url));
    let narrowed = narrow(&results, question, top_n);

    match narrowed.records {
        Some(records) => {
            let prompt = build_prompt(question, &records);
            model.ask(&prompt)
        }
        None => Ok(narrowed.message.unwrap_or_else(|| NO_MATCH_MESSAGE.to_string())),
    }
}
