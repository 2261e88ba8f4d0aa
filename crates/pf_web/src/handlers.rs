use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::AppState;

const DEFAULT_FEED_LIMIT: usize = 100;
const FEED_CACHE_CONTROL: &str = "public, max-age=600, s-maxage=600";

fn internal_error(context: &str, e: impl std::fmt::Display) -> Response {
    error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": context })),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct FeedQuery {
    format: Option<String>,
    site: Option<String>,
    limit: Option<usize>,
}

/// `GET /feed?format=rss|atom|json&site=<id>&limit=<n>`
pub async fn feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT);

    let articles = match &query.site {
        Some(site_id) => state.store.articles_for_site(site_id, limit).await,
        None => state.store.recent_articles(limit).await,
    };
    let articles = match articles {
        Ok(articles) => articles,
        Err(e) => return internal_error("failed to load articles", e),
    };

    let options = match &query.site {
        Some(site_id) => state.feed_options.for_site(site_id),
        None => state.feed_options.clone(),
    };

    let (body, content_type) = match query.format.as_deref().unwrap_or("rss") {
        "atom" => (
            pf_feeds::atom_feed(&articles, &options),
            "application/atom+xml; charset=utf-8",
        ),
        "json" => match pf_feeds::json_feed(&articles, &options) {
            Ok(body) => (body, "application/json; charset=utf-8"),
            Err(e) => return internal_error("failed to render feed", e),
        },
        _ => (
            pf_feeds::rss_feed(&articles, &options),
            "application/rss+xml; charset=utf-8",
        ),
    };

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, FEED_CACHE_CONTROL),
        ],
        body,
    )
        .into_response()
}

#[derive(Serialize)]
struct SiteStatus {
    id: String,
    name: String,
    url: String,
    enabled: bool,
    last_checked: Option<DateTime<Utc>>,
    last_changed: Option<DateTime<Utc>>,
    has_content: bool,
}

#[derive(Serialize)]
struct RecentArticle {
    site: String,
    title: String,
    url: String,
    discovered_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct StatusResponse {
    last_updated: DateTime<Utc>,
    total_sites: usize,
    enabled_sites: usize,
    total_articles: usize,
    sites: Vec<SiteStatus>,
    recent_articles: Vec<RecentArticle>,
}

/// `GET /api/status` - per-site detection state plus recent discoveries.
pub async fn status(State(state): State<Arc<AppState>>) -> Response {
    let states = match state.store.all_site_states().await {
        Ok(states) => states,
        Err(e) => return internal_error("failed to load site states", e),
    };
    let articles = match state.store.recent_articles(50).await {
        Ok(articles) => articles,
        Err(e) => return internal_error("failed to load articles", e),
    };

    let sites: Vec<SiteStatus> = state
        .sites
        .iter()
        .map(|config| {
            let site_state = states.iter().find(|s| s.id == config.id);
            SiteStatus {
                id: config.id.clone(),
                name: config.name.clone(),
                url: config.url.clone(),
                enabled: config.enabled,
                last_checked: site_state.map(|s| s.last_checked),
                last_changed: site_state.and_then(|s| s.last_changed),
                has_content: site_state.map(|s| !s.content.is_empty()).unwrap_or(false),
            }
        })
        .collect();

    let response = StatusResponse {
        last_updated: Utc::now(),
        total_sites: sites.len(),
        enabled_sites: sites.iter().filter(|s| s.enabled).count(),
        total_articles: articles.len(),
        sites,
        recent_articles: articles
            .into_iter()
            .take(10)
            .map(|a| RecentArticle {
                site: a.site_name,
                title: a.title,
                url: a.url,
                discovered_at: a.discovered_at,
            })
            .collect(),
    };

    Json(response).into_response()
}

#[derive(Deserialize)]
pub struct TriggerQuery {
    site: Option<String>,
}

#[derive(Serialize)]
struct TriggerResult {
    site_id: String,
    changed: bool,
    error: Option<String>,
    article_count: usize,
    new_article_count: usize,
}

/// `POST /api/trigger[?site=<id>]` - run detection for one or all sites.
pub async fn trigger(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TriggerQuery>,
) -> Response {
    let configs: Vec<_> = match &query.site {
        Some(site_id) => match state.sites.iter().find(|c| c.id == *site_id) {
            Some(config) => vec![config.clone()],
            None => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": format!("unknown site: {}", site_id) })),
                )
                    .into_response();
            }
        },
        None => state.sites.clone(),
    };

    let outcome = state.detector.detect_all(&configs).await;

    let results: Vec<TriggerResult> = outcome
        .results
        .iter()
        .map(|r| TriggerResult {
            site_id: r.site_id.clone(),
            changed: r.changed,
            error: r.error.clone(),
            article_count: r.articles.len(),
            new_article_count: r.new_articles.len(),
        })
        .collect();

    Json(json!({
        "success": true,
        "stats": {
            "total": results.len(),
            "changed": results.iter().filter(|r| r.changed).count(),
            "errors": results.iter().filter(|r| r.error.is_some()).count(),
            "new_articles": outcome.new_articles.len(),
        },
        "results": results,
    }))
    .into_response()
}
