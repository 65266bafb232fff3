//! Boilerplate removal
//!
//! Produces an owned copy of a document with navigation, ads, footers and
//! popups detached. The source document is left untouched.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;

static UNWANTED: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "nav, footer, .footer, .header, .nav, .advertisement, .ad, .popup, .modal, \
         .subscribe, .newsletter",
    )
    .expect("valid unwanted-block selector")
});

/// Clone `document` and detach every unwanted block from the clone
pub fn strip_boilerplate(document: &Html) -> Html {
    let mut stripped = document.clone();

    let ids: Vec<_> = stripped.select(&UNWANTED).map(|el| el.id()).collect();
    let removed = ids.len();
    for id in ids {
        if let Some(mut node) = stripped.tree.get_mut(id) {
            node.detach();
        }
    }

    if removed > 0 {
        debug!("Stripped {} boilerplate blocks", removed);
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_removes_unwanted_blocks() {
        let html = r#"
        <html><body>
            <nav><a href="/">Home</a></nav>
            <div class="ad">Buy now</div>
            <div class="content"><p>Keep me</p></div>
            <div class="popup modal">Subscribe!</div>
            <footer>Copyright</footer>
        </body></html>
        "#;
        let document = Html::parse_document(html);
        let stripped = strip_boilerplate(&document);

        let text: String = stripped.root_element().text().collect();
        assert!(text.contains("Keep me"));
        assert!(!text.contains("Buy now"));
        assert!(!text.contains("Subscribe!"));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("Home"));

        // the original is not modified
        let original: String = document.root_element().text().collect();
        assert!(original.contains("Buy now"));
    }

    #[test]
    fn test_strip_keeps_partial_class_matches() {
        let html = r#"<div class="header-image">Banner</div><div class="adventure">Trip</div>"#;
        let stripped = strip_boilerplate(&Html::parse_document(html));
        let text: String = stripped.root_element().text().collect();
        assert!(text.contains("Banner"));
        assert!(text.contains("Trip"));
    }
}
