//! Per-site change detection and the fleet orchestrator.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use pf_core::{
    ArticleRecord, DetectionResult, FleetOutcome, PageFetcher, SiteConfig, SiteState, StateStore,
};
use tracing::{info, warn};

use crate::extract::extract_articles;
use crate::fingerprint::fingerprint;

/// Runs detection against a fixed fetcher and store, both injected at
/// construction. Cheap to clone; clones share the same collaborators.
#[derive(Clone)]
pub struct Detector {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn StateStore>,
}

impl Detector {
    pub fn new(fetcher: Arc<dyn PageFetcher>, store: Arc<dyn StateStore>) -> Self {
        Self { fetcher, store }
    }

    /// Detects one site. Never fails: fetch, extraction and store errors are
    /// all captured in the result's `error` field.
    ///
    /// `changed` is true on the site's first-ever detection, when the content
    /// hash drifts from the stored one, or when at least one new article is
    /// found; any one trigger suffices.
    pub async fn detect_site(&self, config: &SiteConfig) -> DetectionResult {
        let mut result = DetectionResult::empty(&config.id);

        let markup = match self.fetcher.fetch(&config.url).await {
            Ok(markup) => markup,
            Err(e) => {
                result.error = Some(format!("fetch failed: {}", e));
                return result;
            }
        };

        let extraction = extract_articles(&markup, config);
        result.current_content = extraction.content.clone();
        result.articles = extraction.articles.clone();

        if extraction.content.is_empty() {
            result.error = Some(format!(
                "no content extracted from {}; check the configured selectors",
                config.url
            ));
            return result;
        }

        let previous = match self.store.site_state(&config.id).await {
            Ok(previous) => previous,
            Err(e) => {
                result.error = Some(format!("state read failed: {}", e));
                return result;
            }
        };

        let current_hash = fingerprint(&extraction.content);
        match previous {
            Some(ref state) if state.content_hash == current_hash => {}
            _ => result.changed = true,
        }

        // New articles are a set difference against the *global* article
        // history, not just the previous run's URL set.
        let urls: Vec<String> = extraction
            .articles
            .iter()
            .filter_map(|a| a.url.clone())
            .collect();
        let mut seen = if urls.is_empty() {
            HashSet::new()
        } else {
            match self.store.existing_urls(&urls).await {
                Ok(seen) => seen,
                Err(e) => {
                    result.error = Some(format!("article history read failed: {}", e));
                    return result;
                }
            }
        };

        for article in &extraction.articles {
            if let Some(url) = &article.url {
                if seen.insert(url.clone()) {
                    result.new_articles.push(article.clone());
                }
            }
        }

        if !result.new_articles.is_empty() {
            result.changed = true;
        }

        result
    }

    /// Runs detection for every enabled site concurrently, waits for all of
    /// them to settle, then persists updated states and new articles in one
    /// bulk pass each.
    pub async fn detect_all(&self, configs: &[SiteConfig]) -> FleetOutcome {
        let enabled: Vec<SiteConfig> = configs.iter().filter(|c| c.enabled).cloned().collect();
        info!("🔍 detecting {} enabled sites", enabled.len());

        let handles: Vec<_> = enabled
            .iter()
            .map(|config| {
                let detector = self.clone();
                let config = config.clone();
                tokio::spawn(async move { detector.detect_site(&config).await })
            })
            .collect();

        let mut results = Vec::with_capacity(enabled.len());
        for (config, handle) in enabled.iter().zip(handles) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    results.push(DetectionResult::failed(
                        &config.id,
                        format!("detection task failed: {}", e),
                    ));
                }
            }
        }

        // Everything discovered in this run shares one timestamp.
        let now = Utc::now();
        let mut states = Vec::new();
        let mut new_articles = Vec::new();

        for (config, result) in enabled.iter().zip(&results) {
            if result.error.is_some() {
                continue;
            }

            states.push(SiteState {
                id: config.id.clone(),
                content_hash: fingerprint(&result.current_content),
                content: result.current_content.clone(),
                last_checked: now,
                last_changed: result.changed.then_some(now),
                known_article_urls: result
                    .articles
                    .iter()
                    .filter_map(|a| a.url.clone())
                    .collect(),
            });

            for article in &result.new_articles {
                if let Some(url) = &article.url {
                    new_articles.push(ArticleRecord {
                        site_id: config.id.clone(),
                        site_name: config.name.clone(),
                        title: article.title.clone(),
                        url: url.clone(),
                        discovered_at: now,
                    });
                }
            }
        }

        // A failed bulk write does not fail the run; the next run will
        // re-detect the same change and the URL dedup keeps that idempotent.
        if !states.is_empty() {
            if let Err(e) = self.store.upsert_site_states(&states).await {
                warn!("failed to persist site states: {}", e);
            }
        }
        if !new_articles.is_empty() {
            match self.store.insert_articles(&new_articles).await {
                Ok(()) => info!("📰 saved {} new articles", new_articles.len()),
                Err(e) => warn!(
                    "failed to persist {} new articles: {}",
                    new_articles.len(),
                    e
                ),
            }
        }

        FleetOutcome {
            results,
            new_articles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pf_core::{Error, Result};
    use pf_storage::MemoryStorage;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Page {
        Html(String),
        Timeout,
        Status(u16),
    }

    struct MockFetcher {
        pages: Mutex<HashMap<String, Page>>,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                pages: Mutex::new(HashMap::new()),
            }
        }

        fn set(&self, url: &str, page: Page) {
            self.pages.lock().unwrap().insert(url.to_string(), page);
        }
    }

    #[async_trait]
    impl PageFetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            match self.pages.lock().unwrap().get(url) {
                Some(Page::Html(html)) => Ok(html.clone()),
                Some(Page::Timeout) => Err(Error::Timeout(url.to_string())),
                Some(Page::Status(status)) => Err(Error::HttpStatus {
                    status: *status,
                    url: url.to_string(),
                }),
                None => Err(Error::Network(format!("no page registered for {}", url))),
            }
        }
    }

    fn site(id: &str) -> SiteConfig {
        SiteConfig {
            id: id.to_string(),
            name: format!("Site {}", id),
            url: format!("https://{}.example.com/blog", id),
            title_selector: Some("h2".to_string()),
            link_selector: Some("a/@href".to_string()),
            description: None,
            enabled: true,
        }
    }

    fn page_with(posts: &[(&str, &str)]) -> Page {
        let body = posts
            .iter()
            .map(|(title, path)| format!(r#"<a href="{}"><h2>{}</h2></a>"#, path, title))
            .collect::<String>();
        Page::Html(format!("<html><body>{}</body></html>", body))
    }

    fn harness() -> (Arc<MockFetcher>, Arc<MemoryStorage>, Detector) {
        let fetcher = Arc::new(MockFetcher::new());
        let store = Arc::new(MemoryStorage::new());
        let detector = Detector::new(fetcher.clone(), store.clone());
        (fetcher, store, detector)
    }

    #[tokio::test]
    async fn test_first_detection_is_a_change() {
        let (fetcher, store, detector) = harness();
        let config = site("a");
        fetcher.set(&config.url, page_with(&[("Hello", "/p/hello")]));

        let outcome = detector.detect_all(std::slice::from_ref(&config)).await;

        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].changed);
        assert!(outcome.results[0].error.is_none());
        assert_eq!(outcome.new_articles.len(), 1);
        assert_eq!(
            outcome.new_articles[0].url,
            "https://a.example.com/p/hello"
        );

        let state = store.site_state("a").await.unwrap().unwrap();
        assert!(!state.content_hash.is_empty());
        assert_eq!(state.content, "Hello");
    }

    #[tokio::test]
    async fn test_unchanged_rerun_is_idempotent() {
        let (fetcher, _store, detector) = harness();
        let config = site("a");
        fetcher.set(&config.url, page_with(&[("Hello", "/p/hello")]));

        detector.detect_all(std::slice::from_ref(&config)).await;
        let second = detector.detect_all(std::slice::from_ref(&config)).await;

        assert!(!second.results[0].changed);
        assert!(second.new_articles.is_empty());
    }

    #[tokio::test]
    async fn test_reappearing_article_is_not_new() {
        let (fetcher, _store, detector) = harness();
        let config = site("a");

        fetcher.set(&config.url, page_with(&[("Old", "/p/old")]));
        detector.detect_all(std::slice::from_ref(&config)).await;

        // The article drops off the page, then comes back.
        fetcher.set(&config.url, page_with(&[("Other", "/p/other")]));
        detector.detect_all(std::slice::from_ref(&config)).await;

        fetcher.set(&config.url, page_with(&[("Old", "/p/old")]));
        let third = detector.detect_all(std::slice::from_ref(&config)).await;

        // Content drifted back, but the URL is in the global history.
        assert!(third.results[0].changed);
        assert!(third.new_articles.is_empty());
    }

    #[tokio::test]
    async fn test_new_article_triggers_change_without_hash_drift() {
        let (fetcher, store, detector) = harness();
        let config = site("a");
        fetcher.set(&config.url, page_with(&[("Hello", "/p/hello")]));
        detector.detect_all(std::slice::from_ref(&config)).await;

        // Same titles (same hash), but the link target changed.
        fetcher.set(&config.url, page_with(&[("Hello", "/p/hello-moved")]));
        let second = detector.detect_all(std::slice::from_ref(&config)).await;

        assert!(second.results[0].changed);
        assert_eq!(second.new_articles.len(), 1);
        assert_eq!(
            second.new_articles[0].url,
            "https://a.example.com/p/hello-moved"
        );
        assert_eq!(store.recent_articles(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_url_on_one_page_reported_once() {
        let (fetcher, _store, detector) = harness();
        let config = site("a");
        fetcher.set(
            &config.url,
            page_with(&[("Hello", "/p/hello"), ("Hello again", "/p/hello")]),
        );

        let outcome = detector.detect_all(std::slice::from_ref(&config)).await;
        assert_eq!(outcome.new_articles.len(), 1);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_an_error_not_a_change() {
        let (fetcher, store, detector) = harness();
        let config = site("a");
        fetcher.set(&config.url, Page::Html("<p>no headings</p>".to_string()));

        let result = detector.detect_site(&config).await;

        assert!(!result.changed);
        assert!(result.current_content.is_empty());
        let error = result.error.unwrap();
        assert!(error.contains("no content extracted"), "got: {}", error);

        // Failed detections leave no state behind.
        assert!(store.site_state("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_error_is_distinguishable_from_extraction_error() {
        let (fetcher, _store, detector) = harness();
        let config = site("a");
        fetcher.set(&config.url, Page::Status(503));

        let result = detector.detect_site(&config).await;
        let error = result.error.unwrap();
        assert!(error.contains("fetch failed"), "got: {}", error);
        assert!(error.contains("503"), "got: {}", error);
    }

    #[tokio::test]
    async fn test_fleet_tolerates_one_timed_out_site() {
        let (fetcher, _store, detector) = harness();
        let configs: Vec<SiteConfig> = ["a", "b", "c", "d", "e"].into_iter().map(site).collect();
        for (i, config) in configs.iter().enumerate() {
            if i == 2 {
                fetcher.set(&config.url, Page::Timeout);
            } else {
                fetcher.set(&config.url, page_with(&[("Post", "/p/post")]));
            }
        }

        let outcome = detector.detect_all(&configs).await;

        assert_eq!(outcome.results.len(), 5);
        let failed = &outcome.results[2];
        assert_eq!(failed.site_id, "c");
        assert!(failed.error.is_some());
        assert!(!failed.changed);
        for (i, result) in outcome.results.iter().enumerate() {
            if i != 2 {
                assert!(result.error.is_none());
                assert!(result.changed);
            }
        }
    }

    #[tokio::test]
    async fn test_disabled_sites_are_skipped() {
        let (fetcher, _store, detector) = harness();
        let enabled = site("a");
        let mut disabled = site("b");
        disabled.enabled = false;
        fetcher.set(&enabled.url, page_with(&[("Post", "/p/post")]));

        let outcome = detector.detect_all(&[enabled, disabled]).await;
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].site_id, "a");
    }

    #[tokio::test]
    async fn test_batch_shares_one_discovery_timestamp() {
        let (fetcher, _store, detector) = harness();
        let configs = vec![site("a"), site("b")];
        for config in &configs {
            fetcher.set(&config.url, page_with(&[("Post", "/p/post")]));
        }

        let outcome = detector.detect_all(&configs).await;
        assert_eq!(outcome.new_articles.len(), 2);
        assert_eq!(
            outcome.new_articles[0].discovered_at,
            outcome.new_articles[1].discovered_at
        );
    }
}
