//! Catalog session handshakes.
//!
//! Every catalog front end wants some state before it answers a search: the
//! modern one hands out session cookies (and, behind its bot check, only to a
//! real browser), the legacy one embeds a per-session POST target in its
//! search form. A [`SessionEstablisher`] obtains that state and wraps it in a
//! [`SearchSession`].
//!
//! Three strategies are provided:
//!
//! - [`BrowserEstablisher`] - headless Chrome, cookies copied into an HTTP client
//! - [`LightweightEstablisher`] - a plain cookie-storing HTTP client
//! - [`DiscoveryEstablisher`] - one GET to find the search form's action URL
//!
//! Sessions are meant to be reused across many lookups and torn down once.
//! They are not shared between concurrent searches.

mod browser;
mod discovery;
mod lightweight;

pub use browser::{BrowserEstablisher, BrowserHandle};
pub use discovery::{find_post_action, DiscoveryEstablisher};
pub use lightweight::LightweightEstablisher;

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use crate::utils::HttpClient;

/// The strategy that produced a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Browser,
    Lightweight,
    Discovery,
    /// Built directly by a caller (tests, mock catalogs)
    Detached,
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionKind::Browser => "browser",
            SessionKind::Lightweight => "lightweight",
            SessionKind::Discovery => "discovery",
            SessionKind::Detached => "detached",
        };
        f.write_str(name)
    }
}

/// Handshake state for one search or one batch of searches
#[derive(Debug)]
pub struct SearchSession {
    kind: SessionKind,
    http: HttpClient,
    action_url: Option<Url>,
    browser: Option<Arc<BrowserHandle>>,
}

impl SearchSession {
    /// Wrap an HTTP client in a session
    pub fn new(kind: SessionKind, http: HttpClient) -> Self {
        Self {
            kind,
            http,
            action_url: None,
            browser: None,
        }
    }

    /// Attach the discovered search form action
    pub fn with_action_url(mut self, action_url: Url) -> Self {
        self.action_url = Some(action_url);
        self
    }

    /// Attach the browser the session was derived from
    pub fn with_browser(mut self, browser: BrowserHandle) -> Self {
        self.browser = Some(Arc::new(browser));
        self
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// HTTP client carrying the session cookies
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// POST target discovered during the handshake
    pub fn action_url(&self) -> Option<&Url> {
        self.action_url.as_ref()
    }

    /// Live browser, for strategies that keep one
    pub fn browser(&self) -> Option<&Arc<BrowserHandle>> {
        self.browser.as_ref()
    }

    /// Release everything the session holds
    ///
    /// Quitting Chrome blocks, so the browser is dropped on the blocking pool.
    pub async fn close(self) {
        let kind = self.kind;
        if let Some(browser) = self.browser {
            if let Err(e) = tokio::task::spawn_blocking(move || drop(browser)).await {
                tracing::warn!("Failed to shut down browser cleanly: {}", e);
            }
        }
        tracing::debug!(%kind, "Session closed");
    }
}

/// Obtains the handshake state a catalog requires before searching
#[async_trait]
pub trait SessionEstablisher: Send + Sync + std::fmt::Debug {
    /// Strategy implemented by this establisher
    fn kind(&self) -> SessionKind;

    /// Perform the handshake
    async fn establish(&self) -> Result<SearchSession, SessionError>;

    /// Tear down a session produced by [`establish`](Self::establish)
    async fn teardown(&self, session: SearchSession) {
        session.close().await;
    }
}

/// Errors that can occur while establishing a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The handshake failed; searches degrade to empty results
    #[error("Session unavailable: {0}")]
    Unavailable(String),

    /// A request that is expected to always succeed did not
    #[error("HTTP error: {0}")]
    Http(String),
}

impl SessionError {
    /// Whether the failure should be absorbed rather than propagated
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;

    #[test]
    fn test_session_error_recoverable() {
        assert!(SessionError::Unavailable("no chrome".into()).is_recoverable());
        assert!(!SessionError::Http("500".into()).is_recoverable());
    }

    #[tokio::test]
    async fn test_detached_session() {
        let http = HttpClient::new(&HttpConfig::default()).unwrap();
        let action = Url::parse("https://catalog.example.org/uhtbin/cgisirsi/123/x/0/5").unwrap();
        let session = SearchSession::new(SessionKind::Detached, http).with_action_url(action.clone());

        assert_eq!(session.kind(), SessionKind::Detached);
        assert_eq!(session.action_url(), Some(&action));
        assert!(session.browser().is_none());
        session.close().await;
    }
}
