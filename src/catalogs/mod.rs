//! Library catalog front ends.
//!
//! This module defines the [`Catalog`] trait that every catalog variant
//! implements. A catalog knows how to establish a session, how to issue a title
//! search over it, and how to turn the returned markup into [`BookRecord`]s.
//!
//! # Variants
//!
//! - `modern` - current front end driven through headless Chrome
//! - `modern-http` - current front end over plain HTTP with handshake cookies
//! - `legacy` - older front end searched by POSTing its discovered search form
//!
//! The variant is chosen at configuration time (`catalog.default`) or per
//! command with `--catalog`.
//!
//! # Format Filtering
//!
//! Entries carrying any of the [`EXCLUDED_FORMATS`](crate::models::EXCLUDED_FORMATS)
//! badges never reach the caller. Result order always matches the page.

mod legacy;
pub mod mock;
mod modern;
mod registry;

pub use legacy::{derive_image_url, LegacyCatalog, EXCLUDED_TITLE_MARKERS};
pub use mock::{MockCatalog, MockEstablisher};
pub use modern::{
    get_status, parse_availability, ModernBrowserCatalog, ModernEntry, ModernExtractor,
    ModernHttpCatalog,
};
pub use registry::{CatalogCapabilities, CatalogRegistry};

use async_trait::async_trait;

use crate::models::{BookRecord, SearchPayload};
use crate::session::{SearchSession, SessionError, SessionEstablisher};

/// The Catalog trait defines the interface for all catalog front ends.
///
/// # Implementing a New Catalog
///
/// 1. Pick or write a [`SessionEstablisher`] for its handshake
/// 2. Implement `fetch_page` to issue a search over an established session
/// 3. Implement `extract` to parse the returned page
/// 4. Add the catalog to `CatalogRegistry::from_config()`
#[async_trait]
pub trait Catalog: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this catalog (used on the command line)
    fn id(&self) -> &str;

    /// Human-readable name of this catalog
    fn name(&self) -> &str;

    /// Describe the capabilities of this catalog
    fn capabilities(&self) -> CatalogCapabilities {
        CatalogCapabilities::empty()
    }

    /// Whether statuses come from live hold lookups
    fn supports_live_holds(&self) -> bool {
        self.capabilities().contains(CatalogCapabilities::LIVE_HOLDS)
    }

    /// Whether search results carry the raw page
    fn keeps_page_content(&self) -> bool {
        self.capabilities()
            .contains(CatalogCapabilities::PAGE_CONTENT)
    }

    /// Handshake strategy used by this catalog
    fn establisher(&self) -> &dyn SessionEstablisher;

    /// Open a session that can be reused across searches
    async fn establish(&self) -> Result<SearchSession, SessionError> {
        self.establisher().establish().await
    }

    /// Release a session opened with [`establish`](Self::establish)
    async fn teardown(&self, session: SearchSession) {
        self.establisher().teardown(session).await
    }

    /// Issue a search and return the raw results page
    ///
    /// `payload` replaces the default form fields on catalogs that POST their
    /// searches; other catalogs ignore it.
    async fn fetch_page(
        &self,
        query: &str,
        session: &SearchSession,
        payload: Option<&SearchPayload>,
    ) -> Result<String, CatalogError>;

    /// Parse a results or single-item page into records
    ///
    /// Scanning stops at the first entry missing a required field; whatever
    /// was collected up to that point is returned.
    async fn extract(&self, page: &str, session: Option<&SearchSession>) -> Vec<BookRecord>;
}

/// An entry lacked a field every usable entry has
///
/// Treated as the end of the result list rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Entry {position} has no {field}")]
pub struct MarkupMismatch {
    /// 1-based position of the entry on the page
    pub position: usize,
    pub field: &'static str,
}

/// Errors that can occur when interacting with a catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Session handshake failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Headless browser error
    #[error("Browser error: {0}")]
    Browser(String),

    /// Catalog or page not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid catalog configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        CatalogError::Network(err.to_string())
    }
}

impl From<url::ParseError> for CatalogError {
    fn from(err: url::ParseError) -> Self {
        CatalogError::Config(format!("URL: {}", err))
    }
}

/// Resolve a possibly relative link against the catalog root
pub(crate) fn resolve_link(base: &url::Url, href: &str) -> String {
    base.join(href.trim())
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_capabilities() {
        let caps = CatalogCapabilities::LIVE_HOLDS | CatalogCapabilities::PAGE_CONTENT;

        assert!(caps.contains(CatalogCapabilities::LIVE_HOLDS));
        assert!(caps.contains(CatalogCapabilities::PAGE_CONTENT));
        assert!(!caps.contains(CatalogCapabilities::DETAIL_PAGE));
    }

    #[test]
    fn test_resolve_link() {
        let base = url::Url::parse("https://fcplcat.fairfaxcounty.gov/").unwrap();
        assert_eq!(
            resolve_link(&base, "/search/title.aspx?cn=12345"),
            "https://fcplcat.fairfaxcounty.gov/search/title.aspx?cn=12345"
        );
        assert_eq!(
            resolve_link(&base, "https://covers.example.com/a.jpg"),
            "https://covers.example.com/a.jpg"
        );
    }

    #[test]
    fn test_markup_mismatch_display() {
        let mismatch = MarkupMismatch {
            position: 3,
            field: "author",
        };
        assert_eq!(mismatch.to_string(), "Entry 3 has no author");
    }
}
