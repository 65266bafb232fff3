//! Article text extraction using the readability algorithm

use std::io::Cursor;

use readability::extractor;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

const EXCERPT_CHARS: usize = 200;

/// Main text of an article-like page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleContent {
    pub title: String,
    /// Plain text content
    pub text: String,
    /// Short excerpt/summary
    pub excerpt: String,
    /// Character count of text
    pub length: usize,
}

/// Run readability over the page. Returns `None` when nothing readable is
/// found. An unparsable or missing URL falls back to a placeholder base.
pub fn extract_article(html: &str, source_url: Option<&str>) -> Option<ArticleContent> {
    let base = source_url
        .and_then(|u| Url::parse(u).ok())
        .or_else(|| Url::parse("http://example.com").ok())?;

    let mut cursor = Cursor::new(html.as_bytes());
    let product = match extractor::extract(&mut cursor, &base) {
        Ok(product) => product,
        Err(e) => {
            debug!("Readability extraction failed: {:?}", e);
            return None;
        }
    };

    let text = product.text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    let length = text.chars().count();
    let mut excerpt: String = text.chars().take(EXCERPT_CHARS).collect();
    if length > EXCERPT_CHARS {
        excerpt.push_str("...");
    }

    Some(ArticleContent {
        title: product.title.trim().to_string(),
        text,
        excerpt,
        length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_text() {
        let body = "The harbour reopened on Monday after a week of repairs. ".repeat(12);
        let html = format!(
            r#"<html><head><title>Harbour reopens</title></head>
            <body><article><h1>Harbour reopens</h1><p>{}</p></article></body></html>"#,
            body
        );

        let article = extract_article(&html, Some("https://news.example.com/a")).unwrap();
        assert!(article.text.contains("harbour reopened"));
        assert_eq!(article.length, article.text.chars().count());
        assert!(article.excerpt.ends_with("..."));
        assert!(article.excerpt.chars().count() <= EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_bad_url_falls_back() {
        let html = "<html><body><p>Enough words here to count as text for the reader.</p></body></html>";
        // must not panic on a relative URL
        let _ = extract_article(html, Some("not a url"));
    }
}
