//! Tunables for extraction and narrowing.

use serde::{Deserialize, Serialize};

/// Configuration for a single extraction call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum number of repeated rows before a grid is accepted
    pub min_rows: usize,
    /// Minimum number of distinct columns before a grid is accepted
    pub min_columns: usize,
    /// Remove navigation, ads, footers and popups before extracting
    pub strip_boilerplate: bool,
    /// Rename columns onto the canonical vocabulary (title, price, ...)
    pub normalize_fields: bool,
    /// Run independent strategies on worker threads (needs the `parallel` feature)
    pub parallel: bool,
    /// Nesting limit when flattening linked-data blocks
    pub max_linked_data_depth: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_rows: 3,
            min_columns: 1,
            strip_boilerplate: true,
            normalize_fields: true,
            parallel: true,
            max_linked_data_depth: 16,
        }
    }
}

/// Configuration for narrowing extracted data down to a question
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrowConfig {
    /// Maximum number of rows handed back (0 keeps every row)
    pub top_n: usize,
    /// Similarity cutoff for fuzzy keyword/column matching
    pub match_cutoff: f64,
}

impl Default for NarrowConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            match_cutoff: 0.6,
        }
    }
}
