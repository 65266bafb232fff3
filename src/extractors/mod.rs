//! HTML extraction modules
//!
//! Each module turns one kind of structure found in a page into records.

mod article_extractor;
mod boilerplate;
mod grid_extractor;
mod jsonld_extractor;
mod table_extractor;

pub use article_extractor::*;
pub use boilerplate::*;
pub use grid_extractor::*;
pub use jsonld_extractor::*;
pub use table_extractor::*;

pub(crate) use grid_extractor::has_repeated_structure;

use scraper::ElementRef;

/// Elements whose boundaries separate words
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Visible text of an element: text nodes outside script/style/template,
/// whitespace collapsed to single spaces. Inline markup does not split words,
/// block boundaries and `<br>` do.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if matches!(name, "script" | "style" | "noscript" | "template") {
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push(' ');
            }
            collect_text(child_el, out);
            if block {
                out.push(' ');
            }
        }
    }
}

/// First non-empty attribute among `names`
pub(crate) fn first_attr<'a>(element: ElementRef<'a>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| element.value().attr(name))
        .map(str::trim)
        .find(|v| !v.is_empty())
}
