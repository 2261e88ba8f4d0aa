use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pf_core::{ArticleRecord, Error, Result, SiteState, StateStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::Row;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS site_states (
        id TEXT PRIMARY KEY,
        content_hash TEXT NOT NULL,
        content TEXT NOT NULL,
        last_checked TEXT NOT NULL,
        last_changed TEXT,
        known_article_urls TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        url TEXT PRIMARY KEY,
        site_id TEXT NOT NULL,
        site_name TEXT NOT NULL,
        title TEXT NOT NULL,
        discovered_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_site ON articles(site_id)",
    "CREATE INDEX IF NOT EXISTS idx_articles_discovered ON articles(discovered_at)",
];

/// SQLite-backed store. Site states upsert by id; the article table is
/// append-only with the URL as primary key, so re-inserting a known article
/// is a no-op and at-least-once persistence stays idempotent.
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| Error::Storage(format!("failed to open {}: {}", db_path.display(), e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("migration {} failed: {}", i, e)))?;
        }

        Ok(Self { pool })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("bad timestamp {:?}: {}", raw, e)))
}

fn state_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SiteState> {
    let urls: String = row.get("known_article_urls");
    Ok(SiteState {
        id: row.get("id"),
        content_hash: row.get("content_hash"),
        content: row.get("content"),
        last_checked: parse_timestamp(&row.get::<String, _>("last_checked"))?,
        last_changed: row
            .get::<Option<String>, _>("last_changed")
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
        known_article_urls: serde_json::from_str(&urls)?,
    })
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ArticleRecord> {
    Ok(ArticleRecord {
        site_id: row.get("site_id"),
        site_name: row.get("site_name"),
        title: row.get("title"),
        url: row.get("url"),
        discovered_at: parse_timestamp(&row.get::<String, _>("discovered_at"))?,
    })
}

#[async_trait]
impl StateStore for SqliteStorage {
    async fn site_state(&self, site_id: &str) -> Result<Option<SiteState>> {
        let row = sqlx::query("SELECT * FROM site_states WHERE id = ?")
            .bind(site_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to read state for {}: {}", site_id, e)))?;

        row.as_ref().map(state_from_row).transpose()
    }

    async fn all_site_states(&self) -> Result<Vec<SiteState>> {
        let rows = sqlx::query("SELECT * FROM site_states ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to read site states: {}", e)))?;

        rows.iter().map(state_from_row).collect()
    }

    async fn upsert_site_states(&self, states: &[SiteState]) -> Result<()> {
        for state in states {
            let urls = serde_json::to_string(&state.known_article_urls)?;
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO site_states
                (id, content_hash, content, last_checked, last_changed, known_article_urls)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&state.id)
            .bind(&state.content_hash)
            .bind(&state.content)
            .bind(state.last_checked.to_rfc3339())
            .bind(state.last_changed.map(|dt| dt.to_rfc3339()))
            .bind(urls)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to upsert state {}: {}", state.id, e)))?;
        }
        Ok(())
    }

    async fn insert_articles(&self, articles: &[ArticleRecord]) -> Result<()> {
        for article in articles {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO articles
                (url, site_id, site_name, title, discovered_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&article.url)
            .bind(&article.site_id)
            .bind(&article.site_name)
            .bind(&article.title)
            .bind(article.discovered_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Storage(format!("failed to insert article {}: {}", article.url, e))
            })?;
        }
        Ok(())
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>> {
        if urls.is_empty() {
            return Ok(HashSet::new());
        }

        let placeholders = vec!["?"; urls.len()].join(", ");
        let sql = format!("SELECT url FROM articles WHERE url IN ({})", placeholders);
        let mut query = sqlx::query(&sql);
        for url in urls {
            query = query.bind(url);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to check known URLs: {}", e)))?;

        Ok(rows.iter().map(|row| row.get("url")).collect())
    }

    async fn recent_articles(&self, limit: usize) -> Result<Vec<ArticleRecord>> {
        let rows = sqlx::query("SELECT * FROM articles ORDER BY discovered_at DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("failed to read articles: {}", e)))?;

        rows.iter().map(record_from_row).collect()
    }

    async fn articles_for_site(&self, site_id: &str, limit: usize) -> Result<Vec<ArticleRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM articles WHERE site_id = ? ORDER BY discovered_at DESC LIMIT ?",
        )
        .bind(site_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("failed to read articles for {}: {}", site_id, e)))?;

        rows.iter().map(record_from_row).collect()
    }
}
