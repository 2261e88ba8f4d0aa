use std::sync::Arc;

use pf_core::{SiteConfig, StateStore};
use pf_detect::Detector;
use pf_feeds::FeedOptions;

pub struct AppState {
    pub detector: Detector,
    pub store: Arc<dyn StateStore>,
    pub sites: Vec<SiteConfig>,
    pub feed_options: FeedOptions,
}
