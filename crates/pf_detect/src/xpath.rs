//! Translation of the constrained XPath dialect accepted in site configs
//! into structural selectors the query engine can execute.
//!
//! Supported constructs:
//! - `//tag` - descendant-anywhere match
//! - `//tag[@attr='v']` - exact attribute value
//! - `//tag[contains(@attr,'v')]` - attribute substring
//! - `//tag[@attr]` - attribute presence
//! - `//a[subtag]` - has-descendant predicate
//! - `//` between segments - descendant combinator; single `/` - direct child
//! - `/@attr` suffix - extract the named attribute instead of text
//! - ` | ` - union of full expressions

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref ATTR_SUFFIX: Regex = Regex::new(r"/@(\w+)\s*$").unwrap();
    static ref CONTAINS_PRED: Regex =
        Regex::new(r#"\[contains\(\s*@(\w+)\s*,\s*['"]([^'"]+)['"]\s*\)\]"#).unwrap();
    static ref ATTR_EQ_PRED: Regex =
        Regex::new(r#"\[\s*@(\w+)\s*=\s*['"]([^'"]+)['"]\s*\]"#).unwrap();
    static ref ATTR_PRESENT_PRED: Regex = Regex::new(r"\[\s*@(\w+)\s*\]").unwrap();
    static ref HAS_DESCENDANT_PRED: Regex = Regex::new(r"\[([A-Za-z][A-Za-z0-9-]*)\]").unwrap();
}

/// A translated expression: the selector itself, plus the attribute to
/// extract when the expression ended in `/@attr` (element text otherwise).
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedSelector {
    pub selector: String,
    pub attr: Option<String>,
}

impl TranslatedSelector {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            attr: None,
        }
    }
}

/// Translates one dialect expression. Never fails: output that the selector
/// engine cannot parse simply matches nothing downstream.
pub fn xpath_to_selector(xpath: &str) -> TranslatedSelector {
    let xpath = xpath.trim();

    // Union of full expressions. If any branch extracts an attribute the
    // whole union does, using the first branch's attribute name.
    if xpath.contains(" | ") {
        let parts: Vec<TranslatedSelector> = xpath
            .split(" | ")
            .map(|p| xpath_to_selector(p.trim()))
            .collect();
        let attr = parts.iter().find_map(|p| p.attr.clone());
        let selector = parts
            .iter()
            .map(|p| p.selector.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return TranslatedSelector { selector, attr };
    }

    if let Some(caps) = ATTR_SUFFIX.captures(xpath) {
        let attr = caps[1].to_string();
        let base = ATTR_SUFFIX.replace(xpath, "");
        return TranslatedSelector {
            selector: translate_path(&base),
            attr: Some(attr),
        };
    }

    TranslatedSelector {
        selector: translate_path(xpath),
        attr: None,
    }
}

/// Rewrites a single path (no union, no `/@attr` suffix) into a selector.
///
/// Attribute values are swapped for placeholders before the structural
/// rewrites run, so values containing `/`, `[` or other reserved characters
/// are never touched by the combinator substitutions, and restored at the end.
fn translate_path(xpath: &str) -> String {
    let mut css = xpath.trim().to_string();
    if let Some(stripped) = css.strip_prefix("//") {
        css = stripped.to_string();
    }

    let mut values: Vec<String> = Vec::new();
    css = CONTAINS_PRED
        .replace_all(&css, |caps: &Captures| {
            values.push(caps[2].to_string());
            format!("[{}*=\"__pfval{}__\"]", &caps[1], values.len() - 1)
        })
        .into_owned();
    css = ATTR_EQ_PRED
        .replace_all(&css, |caps: &Captures| {
            values.push(caps[2].to_string());
            format!("[{}=\"__pfval{}__\"]", &caps[1], values.len() - 1)
        })
        .into_owned();

    css = css.replace("//", " ");
    css = css.replace('/', " > ");

    // Has-descendant must run while presence predicates still carry their
    // `@`, otherwise a fresh `[attr]` would be re-matched as a tag predicate.
    css = HAS_DESCENDANT_PRED.replace_all(&css, ":has($1)").into_owned();
    css = ATTR_PRESENT_PRED.replace_all(&css, "[$1]").into_owned();

    if let Some(stripped) = css.strip_suffix(" > text()") {
        css = stripped.to_string();
    }

    for (i, value) in values.iter().enumerate() {
        css = css.replace(&format!("__pfval{}__", i), value);
    }

    css.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descendant_anywhere() {
        assert_eq!(xpath_to_selector("//h2"), TranslatedSelector::css("h2"));
    }

    #[test]
    fn test_attribute_equality() {
        let t = xpath_to_selector("//div[@class='post']");
        assert_eq!(t.selector, "div[class=\"post\"]");
        assert!(t.attr.is_none());
    }

    #[test]
    fn test_contains_predicate() {
        let t = xpath_to_selector("//a[contains(@href, '/blog/')]");
        assert_eq!(t.selector, "a[href*=\"/blog/\"]");
    }

    #[test]
    fn test_attribute_presence() {
        let t = xpath_to_selector("//a[@href]");
        assert_eq!(t.selector, "a[href]");
    }

    #[test]
    fn test_has_descendant() {
        let t = xpath_to_selector("//a[h3]");
        assert_eq!(t.selector, "a:has(h3)");
    }

    #[test]
    fn test_combinators() {
        assert_eq!(
            xpath_to_selector("//article//h2").selector,
            "article h2"
        );
        assert_eq!(xpath_to_selector("//div/h2").selector, "div > h2");
    }

    #[test]
    fn test_attribute_extraction_suffix() {
        let t = xpath_to_selector("//article//a/@href");
        assert_eq!(t.selector, "article a");
        assert_eq!(t.attr.as_deref(), Some("href"));
    }

    #[test]
    fn test_union() {
        let t = xpath_to_selector("//article//h2//a/@href | //article//h3//a/@href");
        assert_eq!(t.selector, "article h2 a, article h3 a");
        assert_eq!(t.attr.as_deref(), Some("href"));
    }

    #[test]
    fn test_union_without_attributes() {
        let t = xpath_to_selector("//h2 | //h3");
        assert_eq!(t.selector, "h2, h3");
        assert!(t.attr.is_none());
    }

    #[test]
    fn test_reserved_characters_in_values_survive() {
        // The value contains both combinator characters; the structural
        // rewrites must not touch it.
        let t = xpath_to_selector("//a[contains(@href, '/a//b/c')]");
        assert_eq!(t.selector, "a[href*=\"/a//b/c\"]");
    }

    #[test]
    fn test_wildcard_with_id() {
        let t = xpath_to_selector("//*[@id='content']");
        assert_eq!(t.selector, "*[id=\"content\"]");
    }

    #[test]
    fn test_trailing_text_call_dropped() {
        let t = xpath_to_selector("//h2/text()");
        assert_eq!(t.selector, "h2");
    }

    #[test]
    fn test_double_quoted_values() {
        let t = xpath_to_selector(r#"//a[contains(@href, "/blog/")]"#);
        assert_eq!(t.selector, "a[href*=\"/blog/\"]");
    }
}
