pub mod config;
pub mod error;
pub mod fetch;
pub mod storage;
pub mod types;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use fetch::PageFetcher;
pub use storage::StateStore;
pub use types::{
    ArticleInfo, ArticleRecord, DetectionResult, ExtractionResult, FleetOutcome, SiteConfig,
    SiteState,
};
