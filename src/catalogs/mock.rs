//! Mock catalog for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

use super::modern::ModernExtractor;
use super::{Catalog, CatalogCapabilities, CatalogError};
use crate::config::{HoldsConfig, HttpConfig};
use crate::models::{BookRecord, SearchPayload};
use crate::session::{SearchSession, SessionError, SessionEstablisher, SessionKind};
use crate::utils::HttpClient;

/// A session establisher that succeeds or fails on demand and counts calls.
#[derive(Debug, Default)]
pub struct MockEstablisher {
    failure: Mutex<Option<SessionError>>,
    established: AtomicUsize,
    torn_down: AtomicUsize,
}

impl MockEstablisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following handshake fail with `error`.
    pub fn fail_with(&self, error: SessionError) {
        let mut guard = self.failure.lock().unwrap();
        *guard = Some(error);
    }

    /// Number of sessions handed out.
    pub fn established(&self) -> usize {
        self.established.load(Ordering::SeqCst)
    }

    /// Number of sessions torn down.
    pub fn torn_down(&self) -> usize {
        self.torn_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionEstablisher for MockEstablisher {
    fn kind(&self) -> SessionKind {
        SessionKind::Detached
    }

    async fn establish(&self) -> Result<SearchSession, SessionError> {
        let failure = self.failure.lock().unwrap().clone();
        if let Some(error) = failure {
            return Err(error);
        }

        let http = HttpClient::new(&HttpConfig::default())
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;
        self.established.fetch_add(1, Ordering::SeqCst);
        Ok(SearchSession::new(SessionKind::Detached, http))
    }

    async fn teardown(&self, session: SearchSession) {
        self.torn_down.fetch_add(1, Ordering::SeqCst);
        session.close().await;
    }
}

/// A mock catalog that serves a predefined results page.
///
/// Pages use the modern results markup and go through the real extractor.
#[derive(Debug)]
pub struct MockCatalog {
    establisher: MockEstablisher,
    page: Mutex<Option<String>>,
    extractor: ModernExtractor,
}

impl MockCatalog {
    /// Create a new mock catalog.
    pub fn new() -> Self {
        let base = Url::parse("http://catalog.invalid/").expect("static URL");
        Self {
            establisher: MockEstablisher::new(),
            page: Mutex::new(None),
            extractor: ModernExtractor::new(base, HoldsConfig::default()),
        }
    }

    /// Set the results page to return.
    pub fn set_page(&self, page: impl Into<String>) {
        let mut guard = self.page.lock().unwrap();
        *guard = Some(page.into());
    }

    /// Clear the configured page; searches then fail to fetch.
    pub fn clear_page(&self) {
        let mut guard = self.page.lock().unwrap();
        *guard = None;
    }

    /// The establisher behind this catalog.
    pub fn sessions(&self) -> &MockEstablisher {
        &self.establisher
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Catalog"
    }

    fn capabilities(&self) -> CatalogCapabilities {
        CatalogCapabilities::PAGE_CONTENT
    }

    fn establisher(&self) -> &dyn SessionEstablisher {
        &self.establisher
    }

    async fn fetch_page(
        &self,
        query: &str,
        _session: &SearchSession,
        _payload: Option<&SearchPayload>,
    ) -> Result<String, CatalogError> {
        let guard = self.page.lock().unwrap();
        guard
            .clone()
            .ok_or_else(|| CatalogError::NotFound(format!("No page configured for '{}'", query)))
    }

    async fn extract(&self, page: &str, session: Option<&SearchSession>) -> Vec<BookRecord> {
        self.extractor.extract(page, session).await
    }
}

/// Helper function to build a modern results entry for testing.
pub fn make_entry(title: &str, author: Option<&str>, formats: &[&str]) -> String {
    let badges: String = formats
        .iter()
        .map(|f| format!(r#"<img class="c-title-detail-formats__img" title="{}">"#, f))
        .collect();
    let author = author
        .map(|a| format!(r#"<span class="nsm-e118">{}</span>"#, a))
        .unwrap_or_default();
    format!(
        r#"<div class="c-title-detail__container"><span class="nsm-e135">{}</span>{}{}</div>"#,
        title, badges, author
    )
}

/// Helper function to wrap entries in a results page.
pub fn make_page(entries: &[String]) -> String {
    format!("<html><body>{}</body></html>", entries.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_establisher_counts() {
        let establisher = MockEstablisher::new();

        let session = tokio_test::block_on(establisher.establish()).unwrap();
        assert_eq!(establisher.established(), 1);

        tokio_test::block_on(establisher.teardown(session));
        assert_eq!(establisher.torn_down(), 1);
    }

    #[test]
    fn test_mock_establisher_failure() {
        let establisher = MockEstablisher::new();
        establisher.fail_with(SessionError::Unavailable("mocked".into()));

        let result = tokio_test::block_on(establisher.establish());
        assert_eq!(result.unwrap_err(), SessionError::Unavailable("mocked".into()));
        assert_eq!(establisher.established(), 0);
    }

    #[test]
    fn test_mock_catalog_extracts_page() {
        let catalog = MockCatalog::new();
        let page = make_page(&[
            make_entry("Dune", Some("Herbert, Frank"), &["Book"]),
            make_entry("Dune", Some("Herbert, Frank"), &["Eaudiobook"]),
        ]);

        let records = tokio_test::block_on(catalog.extract(&page, None));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title(), "Dune");
    }
}
