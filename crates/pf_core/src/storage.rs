use std::collections::HashSet;

use async_trait::async_trait;

use crate::types::{ArticleRecord, SiteState};
use crate::Result;

/// Persistent store for per-site state and the global article history.
///
/// Bulk writes are idempotent per site id (states) and per URL (articles);
/// they are not required to be atomic across sites.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Last-seen state for one site, if it has ever been detected.
    async fn site_state(&self, site_id: &str) -> Result<Option<SiteState>>;

    async fn all_site_states(&self) -> Result<Vec<SiteState>>;

    /// Replaces each site's state wholesale.
    async fn upsert_site_states(&self, states: &[SiteState]) -> Result<()>;

    /// Appends newly discovered articles. Re-inserting a known URL is a no-op.
    async fn insert_articles(&self, articles: &[ArticleRecord]) -> Result<()>;

    /// Which of the given URLs already exist in the article history.
    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>>;

    /// Most recently discovered articles, newest first.
    async fn recent_articles(&self, limit: usize) -> Result<Vec<ArticleRecord>>;

    async fn articles_for_site(&self, site_id: &str, limit: usize) -> Result<Vec<ArticleRecord>>;
}
