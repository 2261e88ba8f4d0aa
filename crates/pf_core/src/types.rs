use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One watched site, as supplied by the operator. Immutable at runtime.
///
/// Selectors beginning with `/` are treated as the constrained XPath dialect;
/// anything else is handed to the selector engine as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    /// Selector for the title-bearing elements.
    #[serde(default)]
    pub title_selector: Option<String>,
    /// Selector for the nodes holding each article's URL.
    #[serde(default)]
    pub link_selector: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A title/URL pair extracted during one detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleInfo {
    pub title: String,
    pub url: Option<String>,
}

/// Persisted per-site state, overwritten wholesale on each successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteState {
    pub id: String,
    pub content_hash: String,
    pub content: String,
    pub last_checked: DateTime<Utc>,
    pub last_changed: Option<DateTime<Utc>>,
    /// URLs seen on the page during the most recent run. Replaced, not
    /// unioned; the global dedup history lives in the article records.
    pub known_article_urls: Vec<String>,
}

/// Persisted record of a discovered article. Append-only; one per URL, ever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub site_id: String,
    pub site_name: String,
    pub title: String,
    pub url: String,
    pub discovered_at: DateTime<Utc>,
}

/// What the extractor produced for one page.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    /// Newline-joined titles; the unit that gets hashed.
    pub content: String,
    pub articles: Vec<ArticleInfo>,
}

/// Outcome of detecting one site. Failures never propagate out of a
/// detection; they land in `error`.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResult {
    pub site_id: String,
    pub changed: bool,
    pub current_content: String,
    pub articles: Vec<ArticleInfo>,
    pub new_articles: Vec<ArticleInfo>,
    pub error: Option<String>,
}

impl DetectionResult {
    pub fn empty(site_id: &str) -> Self {
        Self {
            site_id: site_id.to_string(),
            changed: false,
            current_content: String::new(),
            articles: Vec::new(),
            new_articles: Vec::new(),
            error: None,
        }
    }

    pub fn failed(site_id: &str, error: impl Into<String>) -> Self {
        let mut result = Self::empty(site_id);
        result.error = Some(error.into());
        result
    }
}

/// Aggregate outcome of one fleet run.
#[derive(Debug, Clone, Serialize)]
pub struct FleetOutcome {
    pub results: Vec<DetectionResult>,
    pub new_articles: Vec<ArticleRecord>,
}
