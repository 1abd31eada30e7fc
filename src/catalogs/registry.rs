//! Registry for the configured catalog front ends.

use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use super::{Catalog, CatalogError, LegacyCatalog, ModernBrowserCatalog, ModernHttpCatalog};
use crate::config::Config;

bitflags::bitflags! {
    /// Capabilities that a catalog can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CatalogCapabilities: u32 {
        /// Statuses come from a per-result availability lookup
        const LIVE_HOLDS = 1 << 0;
        /// Search results carry the raw page
        const PAGE_CONTENT = 1 << 1;
        /// Single-hit searches may land on an item page
        const DETAIL_PAGE = 1 << 2;
        /// Sessions hold a running browser
        const BROWSER = 1 << 3;
    }
}

/// Registry for all configured catalogs
#[derive(Debug, Clone)]
pub struct CatalogRegistry {
    catalogs: HashMap<String, Arc<dyn Catalog>>,
    default_id: String,
}

impl CatalogRegistry {
    /// Create an empty registry whose default is `default_id`
    pub fn new(default_id: impl Into<String>) -> Self {
        Self {
            catalogs: HashMap::new(),
            default_id: default_id.into(),
        }
    }

    /// Create a registry with every catalog variant built from `config`
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        let base = Url::parse(&config.catalog.base_url)?;
        let legacy_search = Url::parse(&config.catalog.legacy_search_url)?;

        let mut registry = Self::new(&config.catalog.default);
        registry.register(Arc::new(ModernBrowserCatalog::new(
            base.clone(),
            config.browser.clone(),
            config.http.clone(),
            config.holds.clone(),
        )));
        registry.register(Arc::new(ModernHttpCatalog::new(
            base.clone(),
            config.http.clone(),
            config.holds.clone(),
        )));
        registry.register(Arc::new(LegacyCatalog::new(
            base,
            legacy_search,
            config.catalog.image_client_id.clone(),
            config.http.clone(),
        )));

        if registry.get(&registry.default_id).is_none() {
            return Err(CatalogError::Config(format!(
                "Unknown default catalog '{}'",
                registry.default_id
            )));
        }

        Ok(registry)
    }

    /// Register a new catalog
    pub fn register(&mut self, catalog: Arc<dyn Catalog>) {
        self.catalogs.insert(catalog.id().to_string(), catalog);
    }

    /// Get a catalog by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Catalog>> {
        self.catalogs.get(id)
    }

    /// Get a catalog by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Catalog>, CatalogError> {
        self.get(id)
            .ok_or_else(|| CatalogError::NotFound(format!("Catalog '{}' not found", id)))
    }

    /// The catalog selected by configuration
    pub fn default_catalog(&self) -> Result<&Arc<dyn Catalog>, CatalogError> {
        self.get_required(&self.default_id)
    }

    /// Get all registered catalogs, ordered by ID
    pub fn all(&self) -> Vec<&Arc<dyn Catalog>> {
        let mut catalogs: Vec<_> = self.catalogs.values().collect();
        catalogs.sort_by(|a, b| a.id().cmp(b.id()));
        catalogs
    }

    /// Get all catalog IDs, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.catalogs.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.catalogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogs.is_empty()
    }
}
