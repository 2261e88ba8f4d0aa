//! Content extraction: runs a site's configured selectors against fetched
//! markup and produces the canonical content string plus the article list.

use pf_core::{ArticleInfo, ExtractionResult, SiteConfig};
use url::Url;

use crate::query::query_elements;
use crate::xpath::{xpath_to_selector, TranslatedSelector};

/// A selector is treated as the XPath dialect when it carries XPath-only
/// syntax; everything else goes to the engine untouched.
fn is_xpath(selector: &str) -> bool {
    selector.starts_with('/')
        || selector.contains("/@")
        || selector.contains("[@")
        || selector.contains("contains(@")
}

fn resolve_selector(selector: &str) -> TranslatedSelector {
    if is_xpath(selector) {
        xpath_to_selector(selector)
    } else {
        TranslatedSelector::css(selector)
    }
}

/// Matched values for a selector: the named attribute when the expression
/// requests one, element text otherwise. Trimmed, empties dropped.
pub fn select_values(markup: &str, selector: &str) -> Vec<String> {
    let resolved = resolve_selector(selector);
    query_elements(markup, &resolved.selector)
        .iter()
        .filter_map(|node| match resolved.attr.as_deref() {
            Some(attr) => node.attr(attr).map(|v| v.trim().to_string()),
            None => Some(node.text.trim().to_string()),
        })
        .filter(|v| !v.is_empty())
        .collect()
}

/// Link extraction: the explicit named attribute or, failing that, `href`
/// on the matched node.
pub fn select_link_urls(markup: &str, selector: &str) -> Vec<String> {
    let resolved = resolve_selector(selector);
    let attr = resolved.attr.as_deref().unwrap_or("href");
    query_elements(markup, &resolved.selector)
        .iter()
        .filter_map(|node| node.attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Normalizes an extracted URL against the site's base URL.
///
/// Absolute URLs pass through; `//host/path` takes the site's scheme;
/// `/path` takes the site's origin; anything else resolves relative to the
/// site URL. Values that cannot be resolved are passed through unchanged.
pub fn normalize_url(raw: &str, base: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }

    let base_url = match Url::parse(base) {
        Ok(u) => u,
        Err(_) => return raw.to_string(),
    };

    if raw.starts_with("//") {
        return format!("{}:{}", base_url.scheme(), raw);
    }
    if raw.starts_with('/') {
        return format!("{}{}", base_url.origin().ascii_serialization(), raw);
    }
    match base_url.join(raw) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Runs both configured selectors and pairs titles with URLs positionally.
/// URLs past the shorter list are simply absent. The canonical `content` is
/// the newline-joined titles - deliberately excluding URLs, so a pure
/// link-target change does not register as content drift on its own.
pub fn extract_articles(markup: &str, config: &SiteConfig) -> ExtractionResult {
    let titles = match config.title_selector.as_deref() {
        Some(selector) => select_values(markup, selector),
        None => Vec::new(),
    };

    let urls: Vec<String> = match config.link_selector.as_deref() {
        Some(selector) => select_link_urls(markup, selector)
            .into_iter()
            .map(|u| normalize_url(&u, &config.url))
            .collect(),
        None => Vec::new(),
    };

    let articles = titles
        .iter()
        .enumerate()
        .map(|(i, title)| ArticleInfo {
            title: title.clone(),
            url: urls.get(i).cloned(),
        })
        .collect();

    ExtractionResult {
        content: titles.join("\n").trim().to_string(),
        articles,
    }
}
