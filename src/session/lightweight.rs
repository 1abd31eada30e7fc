//! Cookie handshake without a browser.

use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

use super::{SearchSession, SessionError, SessionEstablisher, SessionKind};
use crate::config::HttpConfig;
use crate::utils::HttpClient;

/// Handshake by opening the catalog root with a cookie-storing client
///
/// The jar filled while loading the root page (redirects included) moves
/// whole into the client used for searching, so cookies keep the domain and
/// path they were set with. Any failure is reported as
/// [`SessionError::Unavailable`].
#[derive(Debug, Clone)]
pub struct LightweightEstablisher {
    root: Url,
    http: HttpConfig,
}

impl LightweightEstablisher {
    pub fn new(root: Url, http: HttpConfig) -> Self {
        Self { root, http }
    }
}

#[async_trait]
impl SessionEstablisher for LightweightEstablisher {
    fn kind(&self) -> SessionKind {
        SessionKind::Lightweight
    }

    async fn establish(&self) -> Result<SearchSession, SessionError> {
        let handshake = HttpClient::new(&self.http)
            .map_err(|e| SessionError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        tracing::debug!("Opening catalog root: {}", self.root);
        let response = handshake
            .get(self.root.clone())
            .header("Accept", "text/html")
            .send()
            .await
            .map_err(|e| SessionError::Unavailable(format!("Failed to reach catalog: {}", e)))?;

        if !response.status().is_success() {
            return Err(SessionError::Unavailable(format!(
                "Catalog root returned status: {}",
                response.status()
            )));
        }

        let landing = response.url().clone();
        response
            .text()
            .await
            .map_err(|e| SessionError::Unavailable(format!("Failed to read catalog root: {}", e)))?;

        let mut pairs = handshake.cookies_for(&self.root);
        pairs.extend(handshake.cookies_for(&landing));
        pairs.sort_unstable();
        pairs.dedup();

        let http = HttpClient::with_jar(&self.http, Arc::clone(handshake.jar()))
            .map_err(|e| SessionError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(
            cookies = pairs.len(),
            %landing,
            "Session established with {}",
            self.root
        );
        Ok(SearchSession::new(SessionKind::Lightweight, http))
    }
}
