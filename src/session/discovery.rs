//! Search form discovery for the legacy catalog.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::{SearchSession, SessionError, SessionEstablisher, SessionKind};
use crate::config::HttpConfig;
use crate::utils::HttpClient;

/// Find the `action` of the first form submitted by POST
pub fn find_post_action(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("form[action]").ok()?;

    document
        .select(&selector)
        .find(|form| {
            form.value()
                .attr("method")
                .is_some_and(|method| method.trim().eq_ignore_ascii_case("post"))
        })
        .and_then(|form| form.value().attr("action"))
        .map(|action| action.trim().to_string())
        .filter(|action| !action.is_empty())
}

/// Handshake by fetching the legacy search page and reading its form action
///
/// The legacy front end encodes its session in the form's action path, so the
/// action URL is all a search needs. The search page is assumed to always be
/// reachable: transport failures and non-2xx statuses come back as
/// [`SessionError::Http`].
#[derive(Debug, Clone)]
pub struct DiscoveryEstablisher {
    search_page: Url,
    http: HttpConfig,
}

impl DiscoveryEstablisher {
    pub fn new(search_page: Url, http: HttpConfig) -> Self {
        Self { search_page, http }
    }
}

#[async_trait]
impl SessionEstablisher for DiscoveryEstablisher {
    fn kind(&self) -> SessionKind {
        SessionKind::Discovery
    }

    async fn establish(&self) -> Result<SearchSession, SessionError> {
        let http = HttpClient::new(&self.http)
            .map_err(|e| SessionError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        tracing::debug!("Discovering search form at: {}", self.search_page);
        let response = http
            .get(self.search_page.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| SessionError::Http(e.to_string()))?;

        let page_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| SessionError::Http(e.to_string()))?;

        let action = find_post_action(&html).ok_or_else(|| {
            SessionError::Unavailable(format!("No POST form found at {}", page_url))
        })?;
        let action_url = page_url
            .join(&action)
            .map_err(|e| SessionError::Unavailable(format!("Bad form action {:?}: {}", action, e)))?;

        tracing::info!("Search form action discovered: {}", action_url);
        Ok(SearchSession::new(SessionKind::Discovery, http).with_action_url(action_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_post_action() {
        let html = r#"
            <html><body>
              <form action="/uhtbin/cgisirsi/x/0/0/5" method="get" name="quick"></form>
              <form action=" /uhtbin/cgisirsi/Kx8p2/SIRSI/0/57/49/X " method="POST" name="searchform">
                <input type="text" name="searchdata1">
              </form>
            </body></html>
        "#;

        assert_eq!(
            find_post_action(html).as_deref(),
            Some("/uhtbin/cgisirsi/Kx8p2/SIRSI/0/57/49/X")
        );
    }

    #[test]
    fn test_find_post_action_missing() {
        let html = r#"<form action="/search" method="get"></form><form method="post"></form>"#;
        assert_eq!(find_post_action(html), None);
    }
}
