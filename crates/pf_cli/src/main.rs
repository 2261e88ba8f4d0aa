use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use pf_core::{config, Error, PageFetcher, Result, SiteConfig, StateStore};
use pf_detect::extract::extract_articles;
use pf_detect::fingerprint::fingerprint;
use pf_detect::{Detector, HttpFetcher};
use pf_feeds::FeedOptions;
use pf_storage::{MemoryStorage, SqliteStorage};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Selectors the probe falls back to when a site's configured selector
/// matches nothing, to help spot what the page actually uses.
const PROBE_FALLBACKS: &[&str] = &["h1", "h2", "h3", "article h2", "main h2"];

#[derive(Debug, Clone)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if c.is_whitespace() {
                continue;
            } else {
                let num: u64 = current_number
                    .parse()
                    .map_err(|_| format!("expected a number before '{}'", c))?;
                current_number.clear();
                match c {
                    's' => total_seconds += num,
                    'm' => total_seconds += num * 60,
                    'h' => total_seconds += num * 3600,
                    'd' => total_seconds += num * 86400,
                    _ => return Err(format!("invalid duration unit: {}", c)),
                }
            }
        }

        // A bare trailing number means seconds.
        if !current_number.is_empty() {
            total_seconds += current_number
                .parse::<u64>()
                .map_err(|_| "invalid number in duration".to_string())?;
        }

        if total_seconds == 0 {
            return Err("duration must be greater than zero".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Watches pages without feeds and republishes new articles as one", long_about = None)]
struct Cli {
    /// Path to the site configuration JSON file
    #[arg(long, default_value = "sites.json")]
    config: PathBuf,

    /// Storage backend: memory or sqlite
    #[arg(long, default_value = "sqlite")]
    storage: String,

    /// SQLite database path (sqlite backend only)
    #[arg(long, default_value = "pagefeed.db")]
    database: PathBuf,

    /// Fetch timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run detection for one or all enabled sites
    Detect {
        /// Detect only this site id
        #[arg(long)]
        site: Option<String>,
        /// Keep running, re-detecting on this interval (e.g. 1h, 30m, 1h15m)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// Fetch and extract without touching stored state, to debug selectors
    Probe {
        /// Probe only this site id
        #[arg(long)]
        site: Option<String>,
    },
    /// List configured sites
    List,
    /// Serve the feed and status endpoints
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
        /// Public base URL used as the feed's link
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        public_url: String,
    },
}

async fn create_storage(cli: &Cli) -> Result<Arc<dyn StateStore>> {
    match cli.storage.as_str() {
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        "sqlite" => Ok(Arc::new(SqliteStorage::open(&cli.database).await?)),
        other => Err(Error::Config(format!("unknown storage backend: {}", other))),
    }
}

fn select_sites(sites: Vec<SiteConfig>, site_id: Option<&str>) -> Result<Vec<SiteConfig>> {
    match site_id {
        None => Ok(sites),
        Some(id) => {
            let selected: Vec<SiteConfig> = sites.into_iter().filter(|s| s.id == id).collect();
            if selected.is_empty() {
                return Err(Error::Config(format!("unknown site: {}", id)));
            }
            Ok(selected)
        }
    }
}

fn print_outcome(outcome: &pf_core::FleetOutcome) {
    for result in &outcome.results {
        match (&result.error, result.changed) {
            (Some(error), _) => println!("❌ {} - {}", result.site_id, error),
            (None, true) => println!(
                "✨ {} - changed ({} articles, {} new)",
                result.site_id,
                result.articles.len(),
                result.new_articles.len()
            ),
            (None, false) => println!("⏭️ {} - unchanged", result.site_id),
        }
    }
    for article in &outcome.new_articles {
        println!("🆕 [{}] {} - {}", article.site_name, article.title, article.url);
    }
}

async fn run_detect(detector: &Detector, sites: &[SiteConfig]) {
    let started = Instant::now();
    let outcome = detector.detect_all(sites).await;
    print_outcome(&outcome);
    info!(
        "run finished: {} sites, {} changed, {} errors, {} new articles in {:?}",
        outcome.results.len(),
        outcome.results.iter().filter(|r| r.changed).count(),
        outcome.results.iter().filter(|r| r.error.is_some()).count(),
        outcome.new_articles.len(),
        started.elapsed()
    );
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max).collect::<String>())
    }
}

async fn probe_site(fetcher: &dyn PageFetcher, config: &SiteConfig) {
    println!("\n🔍 {} ({})", config.name, config.url);
    if let Some(selector) = &config.title_selector {
        println!("   title selector: {}", selector);
    }
    if let Some(selector) = &config.link_selector {
        println!("   link selector:  {}", selector);
    }

    let started = Instant::now();
    let markup = match fetcher.fetch(&config.url).await {
        Ok(markup) => markup,
        Err(e) => {
            println!("❌ fetch failed: {}", e);
            return;
        }
    };
    println!(
        "📡 fetched {:.1}KB in {:?}",
        markup.len() as f64 / 1024.0,
        started.elapsed()
    );

    let extraction = extract_articles(&markup, config);
    if extraction.content.is_empty() {
        println!("❌ no content extracted; trying common selectors:");
        for fallback in PROBE_FALLBACKS {
            let mut candidate = config.clone();
            candidate.title_selector = Some(fallback.to_string());
            candidate.link_selector = None;
            let attempt = extract_articles(&markup, &candidate);
            if !attempt.content.is_empty() {
                println!("   {} → {} matches", fallback, attempt.articles.len());
            }
        }
        return;
    }

    println!(
        "✨ {} articles, hash {}",
        extraction.articles.len(),
        &fingerprint(&extraction.content)[..12]
    );
    for (i, article) in extraction.articles.iter().enumerate() {
        match &article.url {
            Some(url) => println!("   {}. {}\n      🔗 {}", i + 1, truncate(&article.title, 60), url),
            None => println!("   {}. {}", i + 1, truncate(&article.title, 60)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let sites = config::load_sites(&cli.config)?;
    info!("📋 loaded {} site configurations", sites.len());

    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(HttpFetcher::with_timeout(Duration::from_secs(cli.timeout))?);

    match &cli.command {
        Commands::Detect { site, interval } => {
            let store = create_storage(&cli).await?;
            info!("💾 storage initialized ({})", cli.storage);
            let detector = Detector::new(fetcher, store);
            let sites = select_sites(sites, site.as_deref())?;

            match interval {
                Some(interval) => loop {
                    run_detect(&detector, &sites).await;
                    info!("⏰ next run in {:?}", interval.0);
                    tokio::time::sleep(interval.0).await;
                },
                None => run_detect(&detector, &sites).await,
            }
        }
        Commands::Probe { site } => {
            let sites = select_sites(sites, site.as_deref())?;
            for config in &sites {
                probe_site(fetcher.as_ref(), config).await;
            }
        }
        Commands::List => {
            for site in &sites {
                let marker = if site.enabled { "✅" } else { "🚫" };
                println!("{} {} - {} ({})", marker, site.id, site.name, site.url);
            }
        }
        Commands::Serve { addr, public_url } => {
            let store = create_storage(&cli).await?;
            info!("💾 storage initialized ({})", cli.storage);
            let detector = Detector::new(fetcher, store.clone());

            let feed_options = FeedOptions {
                link: public_url.clone(),
                ..FeedOptions::default()
            };
            let app = pf_web::create_app(pf_web::AppState {
                detector,
                store,
                sites,
                feed_options,
            });

            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("🌐 listening on {}", addr);
            axum::serve(listener, app)
                .await
                .map_err(|e| Error::Network(e.to_string()))?;
        }
    }

    Ok(())
}
