use std::collections::HashSet;
use std::path::Path;

use crate::types::SiteConfig;
use crate::{Error, Result};

/// Loads the site list from an operator-supplied JSON file.
pub fn load_sites(path: &Path) -> Result<Vec<SiteConfig>> {
    let raw = std::fs::read_to_string(path)?;
    let sites: Vec<SiteConfig> = serde_json::from_str(&raw)?;
    validate_sites(&sites)?;
    Ok(sites)
}

/// Site ids must be unique across the whole configuration set.
pub fn validate_sites(sites: &[SiteConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for site in sites {
        if site.id.is_empty() {
            return Err(Error::Config(format!(
                "site {:?} has an empty id",
                site.name
            )));
        }
        if !seen.insert(site.id.as_str()) {
            return Err(Error::Config(format!("duplicate site id: {}", site.id)));
        }
    }
    Ok(())
}
