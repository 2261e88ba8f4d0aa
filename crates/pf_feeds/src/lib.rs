//! Feed serialization: renders the discovered-article history as RSS 2.0,
//! Atom, or JSON Feed. One item per article record, newest first.

use atom_syndication::{
    ContentBuilder, Entry, EntryBuilder, FeedBuilder, LinkBuilder, Text,
};
use chrono::{Datelike, Utc};
use pf_core::{ArticleRecord, Result};
use rss::{ChannelBuilder, Guid, ItemBuilder};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct FeedOptions {
    pub title: String,
    pub description: String,
    pub link: String,
    pub language: String,
    pub author: Option<String>,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            title: "pagefeed".to_string(),
            description: "New articles discovered on watched pages".to_string(),
            link: "https://example.com".to_string(),
            language: "en".to_string(),
            author: None,
        }
    }
}

impl FeedOptions {
    /// Options scoped to one watched site's feed.
    pub fn for_site(&self, site_id: &str) -> Self {
        Self {
            title: format!("{} - {}", self.title, site_id),
            description: format!("New articles discovered on {}", site_id),
            ..self.clone()
        }
    }
}

/// Stable per-item id: URL plus discovery time, so a URL that somehow
/// re-enters the history produces a distinct item.
fn item_id(article: &ArticleRecord) -> String {
    format!("{}-{}", article.url, article.discovered_at.to_rfc3339())
}

fn item_content(article: &ArticleRecord) -> String {
    format!(
        r#"<p>Source: <a href="{}">{}</a></p>"#,
        escape_html(&article.url),
        escape_html(&article.site_name)
    )
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// RSS 2.0.
pub fn rss_feed(articles: &[ArticleRecord], options: &FeedOptions) -> String {
    let items: Vec<rss::Item> = articles
        .iter()
        .map(|article| {
            ItemBuilder::default()
                .title(Some(article.title.clone()))
                .link(Some(article.url.clone()))
                .guid(Some(Guid {
                    value: item_id(article),
                    permalink: false,
                }))
                .description(Some(format!("From {}", article.site_name)))
                .content(Some(item_content(article)))
                .pub_date(Some(article.discovered_at.to_rfc2822()))
                .build()
        })
        .collect();

    let updated = articles
        .first()
        .map(|a| a.discovered_at)
        .unwrap_or_else(Utc::now);

    ChannelBuilder::default()
        .title(options.title.clone())
        .link(options.link.clone())
        .description(options.description.clone())
        .language(Some(options.language.clone()))
        .copyright(Some(format!("Copyright {}", Utc::now().year())))
        .last_build_date(Some(updated.to_rfc2822()))
        .generator(Some("pagefeed".to_string()))
        .items(items)
        .build()
        .to_string()
}

/// Atom 1.0.
pub fn atom_feed(articles: &[ArticleRecord], options: &FeedOptions) -> String {
    let entries: Vec<Entry> = articles
        .iter()
        .map(|article| {
            EntryBuilder::default()
                .title(Text::plain(article.title.clone()))
                .id(item_id(article))
                .updated(article.discovered_at)
                .links(vec![LinkBuilder::default()
                    .href(article.url.clone())
                    .build()])
                .summary(Some(Text::plain(format!("From {}", article.site_name))))
                .content(Some(
                    ContentBuilder::default()
                        .value(Some(item_content(article)))
                        .content_type(Some("html".to_string()))
                        .build(),
                ))
                .build()
        })
        .collect();

    let updated = articles
        .first()
        .map(|a| a.discovered_at)
        .unwrap_or_else(Utc::now);

    FeedBuilder::default()
        .title(Text::plain(options.title.clone()))
        .id(options.link.clone())
        .subtitle(Some(Text::plain(options.description.clone())))
        .updated(updated)
        .links(vec![LinkBuilder::default()
            .href(options.link.clone())
            .build()])
        .entries(entries)
        .build()
        .to_string()
}

#[derive(Serialize)]
struct JsonFeed<'a> {
    version: &'static str,
    title: &'a str,
    home_page_url: &'a str,
    description: &'a str,
    language: &'a str,
    items: Vec<JsonFeedItem>,
}

#[derive(Serialize)]
struct JsonFeedItem {
    id: String,
    url: String,
    title: String,
    content_html: String,
    date_published: String,
}

/// JSON Feed 1.1.
pub fn json_feed(articles: &[ArticleRecord], options: &FeedOptions) -> Result<String> {
    let feed = JsonFeed {
        version: "https://jsonfeed.org/version/1.1",
        title: &options.title,
        home_page_url: &options.link,
        description: &options.description,
        language: &options.language,
        items: articles
            .iter()
            .map(|article| JsonFeedItem {
                id: item_id(article),
                url: article.url.clone(),
                title: article.title.clone(),
                content_html: item_content(article),
                date_published: article.discovered_at.to_rfc3339(),
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&feed)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn articles() -> Vec<ArticleRecord> {
        vec![
            ArticleRecord {
                site_id: "blog".to_string(),
                site_name: "Example & Co".to_string(),
                title: "Second <post>".to_string(),
                url: "https://example.com/p/2".to_string(),
                discovered_at: Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap(),
            },
            ArticleRecord {
                site_id: "blog".to_string(),
                site_name: "Example & Co".to_string(),
                title: "First post".to_string(),
                url: "https://example.com/p/1".to_string(),
                discovered_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            },
        ]
    }

    #[test]
    fn test_rss_contains_items_and_escapes() {
        let feed = rss_feed(&articles(), &FeedOptions::default());
        assert!(feed.contains("<rss"));
        assert!(feed.contains("https://example.com/p/1"));
        assert!(feed.contains("https://example.com/p/2"));
        // The raw angle brackets of the title must not survive into the XML.
        assert!(!feed.contains("Second <post>"));
    }

    #[test]
    fn test_atom_feed_shape() {
        let feed = atom_feed(&articles(), &FeedOptions::default());
        assert!(feed.contains("<feed"));
        assert!(feed.contains("https://example.com/p/2"));
    }

    #[test]
    fn test_json_feed_shape() {
        let feed = json_feed(&articles(), &FeedOptions::default()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&feed).unwrap();
        assert_eq!(
            parsed["version"],
            "https://jsonfeed.org/version/1.1"
        );
        assert_eq!(parsed["items"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["items"][0]["url"], "https://example.com/p/2");
    }

    #[test]
    fn test_empty_history_is_a_valid_feed() {
        let feed = rss_feed(&[], &FeedOptions::default());
        assert!(feed.contains("<rss"));
    }

    #[test]
    fn test_site_scoped_options() {
        let options = FeedOptions::default().for_site("blog");
        assert!(options.title.ends_with("blog"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#039;"
        );
    }
}
