//! Query intent classification
//!
//! Maps a free-text question to intent tags, an optional numeric threshold
//! and the keywords used for fuzzy column matching.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::record::coerce_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTag {
    Comparison,
    FilterGt,
    FilterLt,
    Summarization,
    ListExtraction,
    Generic,
}

/// Trigger phrases per tag, in reporting order
const INTENT_KEYWORDS: &[(IntentTag, &[&str])] = &[
    (
        IntentTag::Comparison,
        &[
            "higher", "lower", "cheapest", "most", "least", "vs", "versus", "highest", "lowest",
            "best", "worst",
        ],
    ),
    (IntentTag::FilterGt, &["over", "above", "greater than", "more than"]),
    (IntentTag::FilterLt, &["under", "below", "less than", "fewer than"]),
    (IntentTag::Summarization, &["summarize", "summary", "overview"]),
    (IntentTag::ListExtraction, &["list", "show", "extract"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
}

impl Operator {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Lt => value < threshold,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Gt => write!(f, ">"),
            Operator::Lt => write!(f, "<"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub operator: Operator,
    pub value: f64,
}

const NUMBER: &str = r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)";

static THRESHOLD_PATTERNS: LazyLock<Vec<(Operator, Regex)>> = LazyLock::new(|| {
    [
        (Operator::Gt, r"(?:over|above|greater than|more than)"),
        (Operator::Lt, r"(?:under|below|less than|fewer than)"),
    ]
    .into_iter()
    .map(|(op, phrase)| {
        let pattern = format!(r"{}\s+{}", phrase, NUMBER);
        (op, Regex::new(&pattern).expect("valid threshold pattern"))
    })
    .collect()
});

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w{3,}").expect("valid regex"));

/// Everything narrowing needs to know about a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub tags: Vec<IntentTag>,
    pub threshold: Option<Threshold>,
    pub keywords: Vec<String>,
}

impl QueryIntent {
    pub fn parse(query: &str) -> Self {
        Self {
            tags: classify_intent(query),
            threshold: extract_threshold(query),
            keywords: extract_keywords(query),
        }
    }

    pub fn has(&self, tag: IntentTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Tags whose trigger phrases occur in the query; `[Generic]` when none do
pub fn classify_intent(query: &str) -> Vec<IntentTag> {
    let q = query.to_lowercase();
    let tags: Vec<IntentTag> = INTENT_KEYWORDS
        .iter()
        .filter(|(_, phrases)| phrases.iter().any(|p| q.contains(p)))
        .map(|(tag, _)| *tag)
        .collect();

    if tags.is_empty() {
        vec![IntentTag::Generic]
    } else {
        tags
    }
}

/// First "over N" style phrase; `>` phrases are tried before `<` phrases
pub fn extract_threshold(query: &str) -> Option<Threshold> {
    let q = query.to_lowercase();
    THRESHOLD_PATTERNS.iter().find_map(|(operator, pattern)| {
        let number = pattern.captures(&q)?.get(1)?;
        let value = coerce_number(number.as_str())?;
        Some(Threshold {
            operator: *operator,
            value,
        })
    })
}

/// Lower-cased word tokens of three or more characters, in query order
pub fn extract_keywords(query: &str) -> Vec<String> {
    let q = query.to_lowercase();
    WORD.find_iter(&q).map(|m| m.as_str().to_string()).collect()
}
