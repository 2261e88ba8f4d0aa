use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use pf_core::{ArticleRecord, Result, SiteState, StateStore};
use tokio::sync::RwLock;

/// Retention cap on the in-memory article history. Oldest records fall off
/// first; the feeds only ever serve the recent end anyway.
const MAX_ARTICLES: usize = 500;

#[derive(Default)]
struct MemoryStore {
    states: HashMap<String, SiteState>,
    /// Newest first.
    articles: Vec<ArticleRecord>,
}

/// In-memory store. Useful for tests and for running without a database;
/// state does not survive the process.
pub struct MemoryStorage {
    store: RwLock<MemoryStore>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            store: RwLock::new(MemoryStore::default()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStorage {
    async fn site_state(&self, site_id: &str) -> Result<Option<SiteState>> {
        Ok(self.store.read().await.states.get(site_id).cloned())
    }

    async fn all_site_states(&self) -> Result<Vec<SiteState>> {
        let store = self.store.read().await;
        let mut states: Vec<SiteState> = store.states.values().cloned().collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(states)
    }

    async fn upsert_site_states(&self, states: &[SiteState]) -> Result<()> {
        let mut store = self.store.write().await;
        for state in states {
            store.states.insert(state.id.clone(), state.clone());
        }
        Ok(())
    }

    async fn insert_articles(&self, articles: &[ArticleRecord]) -> Result<()> {
        let mut store = self.store.write().await;
        for article in articles {
            if store.articles.iter().any(|a| a.url == article.url) {
                continue;
            }
            store.articles.insert(0, article.clone());
        }
        store.articles.truncate(MAX_ARTICLES);
        Ok(())
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>> {
        let store = self.store.read().await;
        let wanted: HashSet<&str> = urls.iter().map(String::as_str).collect();
        Ok(store
            .articles
            .iter()
            .filter(|a| wanted.contains(a.url.as_str()))
            .map(|a| a.url.clone())
            .collect())
    }

    async fn recent_articles(&self, limit: usize) -> Result<Vec<ArticleRecord>> {
        let store = self.store.read().await;
        Ok(store.articles.iter().take(limit).cloned().collect())
    }

    async fn articles_for_site(&self, site_id: &str, limit: usize) -> Result<Vec<ArticleRecord>> {
        let store = self.store.read().await;
        Ok(store
            .articles
            .iter()
            .filter(|a| a.site_id == site_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(site_id: &str, url: &str) -> ArticleRecord {
        ArticleRecord {
            site_id: site_id.to_string(),
            site_name: site_id.to_string(),
            title: format!("Article at {}", url),
            url: url.to_string(),
            discovered_at: Utc::now(),
        }
    }

    fn state(id: &str, hash: &str) -> SiteState {
        SiteState {
            id: id.to_string(),
            content_hash: hash.to_string(),
            content: "Title".to_string(),
            last_checked: Utc::now(),
            last_changed: None,
            known_article_urls: vec![],
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_state_wholesale() {
        let storage = MemoryStorage::new();
        storage
            .upsert_site_states(&[state("a", "hash1")])
            .await
            .unwrap();
        storage
            .upsert_site_states(&[state("a", "hash2")])
            .await
            .unwrap();

        let stored = storage.site_state("a").await.unwrap().unwrap();
        assert_eq!(stored.content_hash, "hash2");
        assert_eq!(storage.all_site_states().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_is_append_only_and_deduplicated() {
        let storage = MemoryStorage::new();
        storage
            .insert_articles(&[record("a", "https://a/1"), record("a", "https://a/1")])
            .await
            .unwrap();
        storage
            .insert_articles(&[record("a", "https://a/1"), record("a", "https://a/2")])
            .await
            .unwrap();

        assert_eq!(storage.recent_articles(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_existing_urls_is_a_subset_check() {
        let storage = MemoryStorage::new();
        storage
            .insert_articles(&[record("a", "https://a/1")])
            .await
            .unwrap();

        let existing = storage
            .existing_urls(&["https://a/1".to_string(), "https://a/2".to_string()])
            .await
            .unwrap();
        assert!(existing.contains("https://a/1"));
        assert!(!existing.contains("https://a/2"));
    }

    #[tokio::test]
    async fn test_articles_for_site_filters() {
        let storage = MemoryStorage::new();
        storage
            .insert_articles(&[record("a", "https://a/1"), record("b", "https://b/1")])
            .await
            .unwrap();

        let articles = storage.articles_for_site("b", 10).await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].site_id, "b");
    }

    #[tokio::test]
    async fn test_retention_cap() {
        let storage = MemoryStorage::new();
        let batch: Vec<ArticleRecord> = (0..(MAX_ARTICLES + 20))
            .map(|i| record("a", &format!("https://a/{}", i)))
            .collect();
        storage.insert_articles(&batch).await.unwrap();

        assert_eq!(
            storage.recent_articles(MAX_ARTICLES * 2).await.unwrap().len(),
            MAX_ARTICLES
        );
    }
}
