pub mod detector;
pub mod extract;
pub mod fetcher;
pub mod fingerprint;
pub mod query;
pub mod xpath;

pub use detector::Detector;
pub use fetcher::HttpFetcher;

pub mod prelude {
    pub use super::detector::Detector;
    pub use super::fetcher::HttpFetcher;
    pub use pf_core::{Error, Result};
}
