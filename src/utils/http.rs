//! HTTP client utilities.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::HttpConfig;

/// HTTP client bound to a cookie jar
///
/// Cloning is cheap and shares both the connection pool and the jar.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    jar: Arc<Jar>,
}

impl HttpClient {
    /// Create a client with an empty cookie jar
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Self::with_jar(config, Arc::new(Jar::default()))
    }

    /// Create a client that reads and writes the given cookie jar
    pub fn with_jar(config: &HttpConfig, jar: Arc<Jar>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .pool_idle_timeout(Duration::from_secs(90))
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self { client, jar })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the cookie jar
    pub fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    pub fn get(&self, url: impl reqwest::IntoUrl) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: impl reqwest::IntoUrl) -> RequestBuilder {
        self.client.post(url)
    }

    /// Cookies the jar would send to `url`, as `name=value` pairs
    pub fn cookies_for(&self, url: &Url) -> Vec<String> {
        cookie_pairs(&self.jar, url)
    }
}

/// Read the `name=value` pairs a jar holds for `url`
pub fn cookie_pairs(jar: &Jar, url: &Url) -> Vec<String> {
    jar.cookies(url)
        .and_then(|header| header.to_str().map(str::to_string).ok())
        .map(|header| {
            header
                .split(';')
                .map(str::trim)
                .filter(|pair| !pair.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
