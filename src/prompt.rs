//! Prompt assembly for the language-model collaborator, and the round trip of
//! the filter action a model may append to its answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::record::{as_number, display_value, Record, RecordSet};

/// Rows of a table block shown to the model
pub const MAX_TABLE_ROWS: usize = 20;

/// Characters of an article or raw block shown to the model
pub const MAX_TEXT_CHARS: usize = 2000;

/// Conversation turns carried into an analysis prompt
pub const MAX_HISTORY_TURNS: usize = 5;

const ACTION_INSTRUCTION: &str = "If you suggest an action, ONLY suggest a filter (not highlight \
or sort). Always output a JSON block at the end of your answer describing the filter action, \
like: {\"action\": \"filter\", \"column\": \"price\", \"operator\": \">\", \"value\": 1000} \
If no filter is suggested, do not output a JSON block.";

/// Prompt for a question over narrowed records, with the data as a markdown
/// table.
pub fn build_prompt(question: &str, set: &RecordSet) -> String {
    format!(
        "The user asked:\n\"\"\"{}\"\"\"\n\nHere is the relevant data ({} rows, columns: {}):\n\n{}\n\nPlease answer the question using only this data.",
        question,
        set.row_count,
        set.columns.join(", "),
        markdown_table(&set.columns, &set.records)
    )
}

/// Content handed to an analysis prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block_type", content = "block_data", rename_all = "snake_case")]
pub enum AnalysisBlock {
    Table(RecordSet),
    Article(String),
    Raw(String),
}

/// One earlier question and its answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub question: String,
    pub answer: String,
}

/// Prompt for a follow-up analysis of one block, carrying the most recent
/// turns of the conversation and the filter-action instruction.
pub fn build_analysis_prompt(
    question: &str,
    block: &AnalysisBlock,
    history: &[HistoryTurn],
) -> String {
    let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
    let history_text: String = history[skip..]
        .iter()
        .map(|turn| format!("Previous Q: {}\nPrevious A: {}\n\n", turn.question, turn.answer))
        .collect();

    let (noun, body, closing) = match block {
        AnalysisBlock::Table(set) => {
            let body = if set.is_empty() {
                "[No data]".to_string()
            } else {
                markdown_table(&set.columns, set.preview(MAX_TABLE_ROWS))
            };
            ("data", body, "data")
        }
        AnalysisBlock::Article(text) => {
            ("article", truncate_chars(text, MAX_TEXT_CHARS), "content")
        }
        AnalysisBlock::Raw(text) => ("data", truncate_chars(text, MAX_TEXT_CHARS), "data"),
    };

    format!(
        "{}The user asked: '{}'\n\nHere is the relevant {}:\n\n{}\n\n{}\nPlease answer using only this {}.",
        history_text, question, noun, body, ACTION_INSTRUCTION, closing
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Pipe-style markdown table; missing cells render empty
pub fn markdown_table(columns: &[String], records: &[Record]) -> String {
    let escape = |s: &str| s.replace('|', "\\|").replace('\n', " ");

    let mut lines = Vec::with_capacity(records.len() + 2);
    lines.push(format!(
        "| {} |",
        columns.iter().map(|c| escape(c.as_str())).collect::<Vec<_>>().join(" | ")
    ));
    lines.push(format!("|{}|", vec!["---"; columns.len()].join("|")));

    for record in records {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| {
                record
                    .get(c)
                    .map(display_value)
                    .map(|v| escape(v.as_str()))
                    .unwrap_or_default()
            })
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    lines.join("\n")
}

/// Filter suggested by the model at the end of an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterAction {
    pub action: String,
    pub column: String,
    pub operator: String,
    pub value: Value,
}

/// The last well-formed filter action embedded in a model answer, if any
pub fn parse_filter_action(answer: &str) -> Option<FilterAction> {
    let starts: Vec<usize> = answer.match_indices('{').map(|(i, _)| i).collect();

    starts.into_iter().rev().find_map(|start| {
        let mut stream =
            serde_json::Deserializer::from_str(&answer[start..]).into_iter::<FilterAction>();
        match stream.next() {
            Some(Ok(action)) if action.action.eq_ignore_ascii_case("filter") => Some(action),
            _ => None,
        }
    })
}

impl FilterAction {
    /// Apply the action to a record set. Rows missing the column are dropped.
    pub fn apply(&self, set: &RecordSet) -> Result<RecordSet> {
        if !self.action.eq_ignore_ascii_case("filter") {
            return Err(Error::InvalidRequest(format!(
                "unsupported action '{}'",
                self.action
            )));
        }
        if !matches!(
            self.operator.as_str(),
            ">" | "<" | ">=" | "<=" | "=" | "==" | "!=" | "contains"
        ) {
            return Err(Error::InvalidRequest(format!(
                "unsupported operator '{}'",
                self.operator
            )));
        }

        let rows = set
            .records
            .iter()
            .filter(|row| row.get(&self.column).is_some_and(|v| self.matches(v)))
            .cloned()
            .collect();
        Ok(set.with_records(rows))
    }

    fn matches(&self, value: &Value) -> bool {
        let numbers = as_number(value).zip(as_number(&self.value));
        match (self.operator.as_str(), numbers) {
            (">", Some((v, t))) => v > t,
            ("<", Some((v, t))) => v < t,
            (">=", Some((v, t))) => v >= t,
            ("<=", Some((v, t))) => v <= t,
            ("=" | "==", Some((v, t))) => v == t,
            ("!=", Some((v, t))) => v != t,
            ("=" | "==", None) => {
                display_value(value).eq_ignore_ascii_case(&display_value(&self.value))
            }
            ("!=", None) => {
                !display_value(value).eq_ignore_ascii_case(&display_value(&self.value))
            }
            ("contains", _) => display_value(value)
                .to_lowercase()
                .contains(&display_value(&self.value).to_lowercase()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn laptops() -> RecordSet {
        RecordSet::new(
            vec![
                record(json!({"name": "Air", "price": 999})),
                record(json!({"name": "Pro | Max", "price": 2499})),
                record(json!({"name": "Basic"})),
            ],
            None,
            "product_listings_table",
        )
    }

    #[test]
    fn test_build_prompt_embeds_markdown_table() {
        let prompt = build_prompt("Which is cheapest?", &laptops());
        assert!(prompt.starts_with("The user asked:\n\"\"\"Which is cheapest?\"\"\""));
        assert!(prompt.contains("(3 rows, columns: name, price)"));
        assert!(prompt.contains("| name | price |\n|---|---|\n| Air | 999 |"));
        assert!(prompt.contains("| Pro \\| Max | 2499 |"));
        assert!(prompt.contains("| Basic |  |"));
        assert!(prompt.ends_with("Please answer the question using only this data."));
    }

    #[test]
    fn test_analysis_prompt_history_and_truncation() {
        let history: Vec<HistoryTurn> = (1..=7)
            .map(|i| HistoryTurn {
                question: format!("q{}", i),
                answer: format!("a{}", i),
            })
            .collect();
        let article = "x".repeat(MAX_TEXT_CHARS + 500);

        let prompt = build_analysis_prompt("Summarize", &AnalysisBlock::Article(article), &history);
        assert!(!prompt.contains("Previous Q: q2\n"));
        assert!(prompt.starts_with("Previous Q: q3\nPrevious A: a3\n\n"));
        assert!(prompt.contains("Previous Q: q7"));
        assert!(prompt.contains("Here is the relevant article:"));
        assert!(prompt.contains(&"x".repeat(MAX_TEXT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(MAX_TEXT_CHARS + 1)));
        assert!(prompt.contains(ACTION_INSTRUCTION));
        assert!(prompt.ends_with("Please answer using only this content."));
    }

    #[test]
    fn test_analysis_prompt_empty_table() {
        let block = AnalysisBlock::Table(RecordSet::empty("grid"));
        let prompt = build_analysis_prompt("Q", &block, &[]);
        assert!(prompt.starts_with("The user asked: 'Q'"));
        assert!(prompt.contains("[No data]"));
    }

    #[test]
    fn test_parse_filter_action() {
        let answer = r#"The Air is cheapest. Example {not json}.
        {"action": "filter", "column": "price", "operator": ">", "value": 1000}"#;
        let action = parse_filter_action(answer).unwrap();
        assert_eq!(action.column, "price");
        assert_eq!(action.value, json!(1000));

        assert!(parse_filter_action("No filter needed.").is_none());
    }

    #[test]
    fn test_apply_filter_action() {
        let set = laptops();
        let action = FilterAction {
            action: "filter".into(),
            column: "price".into(),
            operator: ">".into(),
            value: json!("1,000"),
        };
        let filtered = action.apply(&set).unwrap();
        assert_eq!(filtered.row_count, 1);
        assert_eq!(filtered.records[0]["name"], json!("Pro | Max"));

        let contains = FilterAction {
            operator: "contains".into(),
            column: "name".into(),
            value: json!("AIR"),
            ..action.clone()
        };
        assert_eq!(contains.apply(&set).unwrap().row_count, 1);

        let bad = FilterAction {
            operator: "~".into(),
            ..action
        };
        assert!(matches!(bad.apply(&set), Err(Error::InvalidRequest(_))));
    }
}
