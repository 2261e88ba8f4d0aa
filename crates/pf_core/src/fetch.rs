use async_trait::async_trait;

use crate::Result;

/// Retrieves raw page markup for a URL.
///
/// Implementations fail with `Error::Timeout`, `Error::HttpStatus` or
/// `Error::Network`; the detector folds those into per-site results.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}
