//! Relevance matching between query keywords and extracted record sets
//!
//! Column names are compared with a Ratcliff/Obershelp similarity ratio
//! (twice the number of matched characters over the combined length).

use tracing::debug;

use crate::record::RecordSet;

/// Default similarity cutoff for a keyword to count as naming a column
pub const DEFAULT_CUTOFF: f64 = 0.6;

/// Candidates returned per keyword
const MAX_CLOSE_MATCHES: usize = 3;

/// Similarity ratio in `[0, 1]`; two empty strings are identical
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Characters covered by the recursive longest-common-block decomposition
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, size) = longest_block(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            queue.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block within the given windows. Ties go to the block that
/// starts earliest in `a`, then earliest in `b`.
fn longest_block(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run length of the match ending at (i - 1, j)
    let mut prev = vec![0usize; bhi - blo + 1];

    for i in alo..ahi {
        let mut current = vec![0usize; bhi - blo + 1];
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let k = prev[j - blo] + 1;
            current[j - blo + 1] = k;
            if k > best_size {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best_size = k;
            }
        }
        prev = current;
    }

    (best_i, best_j, best_size)
}

/// Up to three possibilities scoring at least `cutoff` against `word`, best
/// first. Equal scores put the larger string first.
pub fn close_matches<'a>(word: &str, possibilities: &'a [String], cutoff: f64) -> Vec<&'a str> {
    let mut scored: Vec<(f64, &str)> = possibilities
        .iter()
        .map(|p| (similarity(p, word), p.as_str()))
        .filter(|(score, _)| *score >= cutoff)
        .collect();

    scored.sort_by(|x, y| y.0.total_cmp(&x.0).then_with(|| y.1.cmp(x.1)));
    scored.truncate(MAX_CLOSE_MATCHES);
    scored.into_iter().map(|(_, p)| p).collect()
}

fn lowercase_columns(set: &RecordSet) -> Vec<String> {
    set.columns.iter().map(|c| c.to_lowercase()).collect()
}

/// Pick the record set whose column names best match the keywords.
///
/// Each keyword with at least one close column match scores one point; the
/// first candidate with the strictly highest score wins. With no point
/// anywhere, the candidate with the most rows wins (first on ties). An empty
/// candidate list yields `None`.
pub fn match_best_table<'a>(
    candidates: &'a [RecordSet],
    keywords: &[String],
    cutoff: f64,
) -> Option<&'a RecordSet> {
    let mut best: Option<(usize, &RecordSet)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let columns = lowercase_columns(candidate);
        let score = keywords
            .iter()
            .filter(|k| !close_matches(k, &columns, cutoff).is_empty())
            .count();
        debug!("Candidate {} ({}) scored {}", index, candidate.content_type_label, score);

        if score > best.map_or(0, |(s, _)| s) {
            best = Some((score, candidate));
        }
    }

    if let Some((_, set)) = best {
        return Some(set);
    }

    let mut largest: Option<&RecordSet> = None;
    for candidate in candidates {
        if largest.map_or(true, |l| candidate.row_count > l.row_count) {
            largest = Some(candidate);
        }
    }
    largest
}

/// Columns of `set` that some keyword fuzzily names, first-seen order,
/// original casing.
pub fn match_columns(set: &RecordSet, keywords: &[String], cutoff: f64) -> Vec<String> {
    let lowered = lowercase_columns(set);
    let mut matched: Vec<String> = Vec::new();

    for keyword in keywords {
        for hit in close_matches(&keyword.to_lowercase(), &lowered, cutoff) {
            let original = set
                .columns
                .iter()
                .find(|c| c.to_lowercase() == hit)
                .cloned()
                .unwrap_or_else(|| hit.to_string());
            if !matched.contains(&original) {
                matched.push(original);
            }
        }
    }

    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use serde_json::Value;

    fn set(columns: &[&str], rows: usize) -> RecordSet {
        let records = (0..rows)
            .map(|i| {
                let mut record = Record::new();
                for c in columns {
                    record.insert(c.to_string(), Value::from(i as i64));
                }
                record
            })
            .collect();
        RecordSet::new(records, None, "generic_table")
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity("price", "price"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        // "prices" vs "price": 5 matched of 11 characters
        assert!((similarity("prices", "price") - 10.0 / 11.0).abs() < 1e-9);
        // blocks "ab" and "d" match: 2 * 3 / 8
        assert!((similarity("abxd", "abyd") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_close_matches_cutoff_and_order() {
        let columns = words(&["name", "price", "prices", "rating"]);
        assert_eq!(close_matches("prices", &columns, 0.6), vec!["prices", "price"]);
        assert!(close_matches("zzz", &columns, 0.6).is_empty());
    }

    #[test]
    fn test_close_matches_ties_prefer_larger_string() {
        let columns = words(&["ax", "az", "ay", "aw"]);
        // every column shares one of two characters with "ab"
        assert_eq!(close_matches("ab", &columns, 0.5), vec!["az", "ay", "ax"]);
    }

    #[test]
    fn test_best_table_by_keyword_hits() {
        let candidates = vec![set(&["Name", "Year"], 10), set(&["Name", "Price"], 2)];
        let best = match_best_table(&candidates, &words(&["prices", "name"]), DEFAULT_CUTOFF);
        assert_eq!(best.map(|s| s.row_count), Some(2));
    }

    #[test]
    fn test_best_table_falls_back_to_largest() {
        let candidates = vec![set(&["a"], 2), set(&["b"], 5), set(&["c"], 5)];
        let best = match_best_table(&candidates, &words(&["nothing"]), DEFAULT_CUTOFF).unwrap();
        assert_eq!(best.columns, vec!["b"]);
    }

    #[test]
    fn test_best_table_edge_cases() {
        assert!(match_best_table(&[], &words(&["price"]), DEFAULT_CUTOFF).is_none());

        let single = vec![set(&["x"], 1)];
        let best = match_best_table(&single, &[], DEFAULT_CUTOFF);
        assert_eq!(best, Some(&single[0]));
    }

    #[test]
    fn test_match_columns_restores_case_and_dedupes() {
        let table = set(&["Product Name", "Price", "Rating"], 1);
        let keywords = words(&["price", "prices", "ratings"]);
        let columns = match_columns(&table, &keywords, DEFAULT_CUTOFF);
        assert_eq!(columns, vec!["Price", "Rating"]);
    }
}
