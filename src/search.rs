//! Search orchestration.
//!
//! [`search_for_book`] drives a single title search through a catalog:
//! establish a session when the caller has none, fetch the results page,
//! extract records, and tear down whatever it opened itself. Handshakes that
//! fail recoverably and page fetches that fail degrade to an empty result.
//! Only hard HTTP failures during the handshake reach the caller.

use crate::catalogs::{Catalog, CatalogError};
use crate::models::{SearchPayload, SearchResult};
use crate::session::{SearchSession, SessionError};

/// Search `catalog` for `query`
///
/// A provided `session` is reused and left open; otherwise a fresh one is
/// established and torn down before returning. `payload` overrides the form
/// fields on catalogs that POST searches.
pub async fn search_for_book(
    catalog: &dyn Catalog,
    query: &str,
    session: Option<&SearchSession>,
    payload: Option<&SearchPayload>,
) -> Result<SearchResult, CatalogError> {
    if let Some(session) = session {
        return Ok(run_search(catalog, query, session, payload).await);
    }

    let session = match open_session(catalog).await? {
        Some(session) => session,
        None => return Ok(SearchResult::empty(query)),
    };

    let result = run_search(catalog, query, &session, payload).await;
    catalog.teardown(session).await;
    Ok(result)
}

/// Search `catalog` for every title over a single session
///
/// Titles are searched one after another in order. When the session cannot
/// be established, every title gets an empty result.
pub async fn search_many<S: AsRef<str>>(
    catalog: &dyn Catalog,
    titles: &[S],
) -> Result<Vec<SearchResult>, CatalogError> {
    let session = match open_session(catalog).await? {
        Some(session) => session,
        None => {
            return Ok(titles
                .iter()
                .map(|title| SearchResult::empty(title.as_ref()))
                .collect())
        }
    };

    let mut results = Vec::with_capacity(titles.len());
    for title in titles {
        results.push(run_search(catalog, title.as_ref(), &session, None).await);
    }

    catalog.teardown(session).await;
    Ok(results)
}

async fn open_session(catalog: &dyn Catalog) -> Result<Option<SearchSession>, SessionError> {
    match catalog.establish().await {
        Ok(session) => {
            tracing::debug!(catalog = catalog.id(), kind = %session.kind(), "Session established");
            Ok(Some(session))
        }
        Err(e) if e.is_recoverable() => {
            tracing::warn!(catalog = catalog.id(), "{}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn run_search(
    catalog: &dyn Catalog,
    query: &str,
    session: &SearchSession,
    payload: Option<&SearchPayload>,
) -> SearchResult {
    let page = match catalog.fetch_page(query, session, payload).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(catalog = catalog.id(), query, "Search failed: {}", e);
            return SearchResult::empty(query);
        }
    };

    let records = catalog.extract(&page, Some(session)).await;
    tracing::info!(
        catalog = catalog.id(),
        query,
        count = records.len(),
        "Found {} matching records",
        records.len()
    );

    let result = SearchResult::new(query, records);
    if catalog.keeps_page_content() {
        result.with_page_content(page)
    } else {
        result
    }
}
