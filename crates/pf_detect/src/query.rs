//! The fixed selector-execution interface the extractor is built against.
//! Everything that touches the HTML parsing library lives here, so the
//! engine can be swapped without disturbing the extraction logic.

use std::collections::HashMap;

use scraper::{Html, Selector};
use tracing::warn;

/// One matched element: its concatenated text content and its attributes.
#[derive(Debug, Clone)]
pub struct MatchedNode {
    pub text: String,
    pub attrs: HashMap<String, String>,
}

impl MatchedNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// Runs a selector against markup, returning matches in document order.
///
/// A selector the engine cannot parse matches nothing; that is an operator
/// configuration problem, logged rather than raised.
pub fn query_elements(markup: &str, selector: &str) -> Vec<MatchedNode> {
    let parsed = match Selector::parse(selector) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("unparseable selector {:?}: {}", selector, e);
            return Vec::new();
        }
    };

    let document = Html::parse_document(markup);
    document
        .select(&parsed)
        .map(|el| MatchedNode {
            text: el.text().collect::<String>(),
            attrs: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKUP: &str = r#"
        <html><body>
            <article><h2>First</h2></article>
            <article><h2>Second</h2></article>
            <a href="/one" class="link">One</a>
        </body></html>
    "#;

    #[test]
    fn test_matches_in_document_order() {
        let nodes = query_elements(MARKUP, "article h2");
        let texts: Vec<_> = nodes.iter().map(|n| n.text.trim()).collect();
        assert_eq!(texts, vec!["First", "Second"]);
    }

    #[test]
    fn test_attributes_are_captured() {
        let nodes = query_elements(MARKUP, "a");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].attr("href"), Some("/one"));
        assert_eq!(nodes[0].attr("class"), Some("link"));
        assert!(nodes[0].attr("id").is_none());
    }

    #[test]
    fn test_malformed_selector_matches_nothing() {
        assert!(query_elements(MARKUP, "a[[").is_empty());
    }

    #[test]
    fn test_no_matches() {
        assert!(query_elements(MARKUP, "section.missing").is_empty());
    }
}
