//! Read-only site configuration lookup.

use std::collections::HashMap;

use crate::schema::{Config, SiteConfig};

/// Source of per-site automation profiles.
pub trait SiteStore: Send + Sync {
    /// Profile for a domain, if configured.
    fn site_config(&self, domain: &str) -> Option<SiteConfig>;

    /// All configured domains, sorted.
    fn domains(&self) -> Vec<String>;

    /// Map a requested model name to a domain.
    ///
    /// A domain name is its own model; sites may list extra aliases.
    fn resolve_model(&self, model: &str) -> Option<String>;
}

/// Site store backed by the loaded configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticSiteStore {
    sites: HashMap<String, SiteConfig>,
}

impl StaticSiteStore {
    pub fn new(sites: HashMap<String, SiteConfig>) -> Self {
        Self { sites }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sites.clone())
    }

    pub fn insert(&mut self, domain: impl Into<String>, site: SiteConfig) {
        self.sites.insert(domain.into(), site);
    }
}

impl SiteStore for StaticSiteStore {
    fn site_config(&self, domain: &str) -> Option<SiteConfig> {
        self.sites.get(domain).cloned()
    }

    fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.sites.keys().cloned().collect();
        domains.sort();
        domains
    }

    fn resolve_model(&self, model: &str) -> Option<String> {
        if self.sites.contains_key(model) {
            return Some(model.to_string());
        }
        self.sites
            .iter()
            .filter(|(_, site)| site.models.iter().any(|m| m == model))
            .map(|(domain, _)| domain.clone())
            .min()
    }
}
