//! Headless browser handshake.

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use reqwest::cookie::Jar;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::{SearchSession, SessionError, SessionEstablisher, SessionKind};
use crate::config::{BrowserConfig, HttpConfig};
use crate::utils::HttpClient;

/// Chrome is left idle while results are parsed and holds are looked up over
/// plain HTTP; keep the connection to it open well beyond that.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

/// A running headless Chrome with one tab
///
/// Dropping the handle quits the browser process.
pub struct BrowserHandle {
    browser: Browser,
    tab: Arc<Tab>,
    settle_delay: Duration,
}

impl std::fmt::Debug for BrowserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserHandle")
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl BrowserHandle {
    /// Launch Chrome and open a tab
    pub fn launch(config: &BrowserConfig, user_agent: &str) -> Result<Self, String> {
        let user_agent_arg = format!("--user-agent={}", user_agent);
        let args: Vec<&OsStr> = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&user_agent_arg),
        ];

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .path(config.chrome_path.clone())
            .window_size(Some((config.window_width, config.window_height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(args)
            .build()
            .map_err(|e| format!("Invalid browser options: {}", e))?;

        let browser = Browser::new(options).map_err(|e| format!("Failed to launch browser: {}", e))?;
        let tab = browser
            .new_tab()
            .map_err(|e| format!("Failed to open tab: {}", e))?;
        tab.set_default_timeout(Duration::from_secs(config.navigation_timeout_seconds));

        Ok(Self {
            browser,
            tab,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        })
    }

    /// Navigate the tab and wait for the load to finish
    pub fn navigate(&self, url: &str) -> Result<(), String> {
        tracing::debug!("Browser navigating to: {}", url);
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| format!("Navigation to {} failed: {}", url, e))
    }

    /// Navigate, give client-side rendering time to populate, and read the page
    pub fn page_source(&self, url: &str) -> Result<String, String> {
        self.navigate(url)?;
        std::thread::sleep(self.settle_delay);
        self.tab
            .get_content()
            .map_err(|e| format!("Failed to read page source: {}", e))
    }

    /// Cookies visible to the current page, as `(domain, name, value)`
    pub fn cookies(&self) -> Result<Vec<(String, String, String)>, String> {
        let cookies = self
            .tab
            .get_cookies()
            .map_err(|e| format!("Failed to read cookies: {}", e))?;

        Ok(cookies
            .into_iter()
            .map(|c| (c.domain, c.name, c.value))
            .collect())
    }

    /// Number of tabs the browser has open
    pub fn tab_count(&self) -> usize {
        self.browser
            .get_tabs()
            .lock()
            .map(|tabs| tabs.len())
            .unwrap_or_default()
    }
}

/// Returns true if a cookie set for `domain` should travel to `host`
fn domain_matches(domain: &str, host: &str) -> bool {
    let domain = domain.trim_start_matches('.');
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Handshake through a real (headless) browser
///
/// The catalog's bot check only issues session cookies to a browser that runs
/// its scripts. The browser stays alive in the session; searches navigate it
/// to the results page.
#[derive(Debug, Clone)]
pub struct BrowserEstablisher {
    root: Url,
    browser: BrowserConfig,
    http: HttpConfig,
}

impl BrowserEstablisher {
    pub fn new(root: Url, browser: BrowserConfig, http: HttpConfig) -> Self {
        Self {
            root,
            browser,
            http,
        }
    }
}

#[async_trait]
impl SessionEstablisher for BrowserEstablisher {
    fn kind(&self) -> SessionKind {
        SessionKind::Browser
    }

    async fn establish(&self) -> Result<SearchSession, SessionError> {
        let config = self.browser.clone();
        let user_agent = self.http.user_agent.clone();
        let root = self.root.clone();

        let (handle, cookies) = tokio::task::spawn_blocking(move || {
            let handle = BrowserHandle::launch(&config, &user_agent)?;
            handle.navigate(root.as_str())?;
            let cookies = handle.cookies()?;
            tracing::debug!(tabs = handle.tab_count(), "Browser ready");
            Ok::<_, String>((handle, cookies))
        })
        .await
        .map_err(|e| SessionError::Unavailable(format!("Browser task failed: {}", e)))?
        .map_err(SessionError::Unavailable)?;

        let host = self.root.host_str().unwrap_or_default();
        let jar = Arc::new(Jar::default());
        let mut copied = 0;
        for (domain, name, value) in cookies {
            if domain_matches(&domain, host) {
                jar.add_cookie_str(&format!("{}={}; Path=/", name, value), &self.root);
                copied += 1;
            }
        }

        let http = HttpClient::with_jar(&self.http, jar)
            .map_err(|e| SessionError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(cookies = copied, "Browser session established with {}", self.root);
        Ok(SearchSession::new(SessionKind::Browser, http).with_browser(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_matches() {
        assert!(domain_matches("fcplcat.fairfaxcounty.gov", "fcplcat.fairfaxcounty.gov"));
        assert!(domain_matches(".fairfaxcounty.gov", "fcplcat.fairfaxcounty.gov"));
        assert!(!domain_matches("tracker.example.com", "fcplcat.fairfaxcounty.gov"));
        assert!(!domain_matches("xfairfaxcounty.gov", "fcplcat.fairfaxcounty.gov"));
    }

    #[tokio::test]
    async fn test_missing_browser_is_unavailable() {
        let browser = BrowserConfig {
            chrome_path: Some("/nonexistent/chrome".into()),
            ..BrowserConfig::default()
        };
        let establisher = BrowserEstablisher::new(
            Url::parse("https://catalog.example.org/").unwrap(),
            browser,
            HttpConfig::default(),
        );

        let result = establisher.establish().await;
        assert!(matches!(result, Err(SessionError::Unavailable(_))));
    }
}
