//! Schema-free structured data extraction from HTML
//!
//! Turns arbitrary pages into record sets and narrows them to a question:
//! - literal tables, with numeric/text column typing
//! - repeated "grid" structures found by structural signatures
//! - JSON-LD blocks (with @graph and ItemList support), flattened
//! - article text via readability
//! - query intent, fuzzy column matching, threshold filtering and ranking
//!
//! Fetching pages and asking a language model are collaborators behind the
//! [`fetch::PageFetcher`] and [`llm::LanguageModel`] traits.

pub mod classifier;
pub mod config;
pub mod error;
pub mod extractors;
pub mod ffi;
pub mod fetch;
pub mod llm;
pub mod matcher;
pub mod narrower;
pub mod normalizer;
pub mod pipeline;
pub mod prompt;
pub mod query;
pub mod record;
pub mod signature;

pub use classifier::{classify, ContentType};
pub use config::{ExtractionConfig, NarrowConfig};
pub use error::{Error, Result};
pub use ffi::*;
pub use pipeline::{
    ask, extract, extract_with_config, narrow, narrow_with_config, ExtractionResult, NarrowResult,
};
pub use record::{Record, RecordSet};
