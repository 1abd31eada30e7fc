//! Configuration management.
//!
//! Settings are read from a TOML file and can be overridden with
//! `LIBRARY_STATUS__<SECTION>__<KEY>` environment variables.
//!
//! # Configuration File Format
//!
//! ```toml
//! [catalog]
//! default = "modern-http"
//! base_url = "https://fcplcat.fairfaxcounty.gov"
//! legacy_search_url = "https://fcplcat.fairfaxcounty.gov/uhtbin/cgisirsi/x/0/0/57/49"
//! image_client_id = "fairfaxpl"
//!
//! [http]
//! timeout_seconds = 30
//!
//! [browser]
//! headless = true
//! settle_delay_ms = 1000
//!
//! [holds]
//! enabled = false
//! max_lookups = 10
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the working and config directories
pub const CONFIG_FILE_NAME: &str = "library-status.toml";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "LIBRARY_STATUS";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub holds: HoldsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// Which catalog to search and where it lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Catalog id used when none is given on the command line
    #[serde(default = "default_catalog")]
    pub default: String,

    /// Root of the catalog site
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Search page of the legacy front end, fetched to discover the form action
    #[serde(default = "default_legacy_search_url")]
    pub legacy_search_url: String,

    /// Client id the cover image service expects
    #[serde(default = "default_image_client_id")]
    pub image_client_id: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default: default_catalog(),
            base_url: default_base_url(),
            legacy_search_url: default_legacy_search_url(),
            image_client_id: default_image_client_id(),
        }
    }
}

fn default_catalog() -> String {
    "modern-http".to_string()
}

fn default_base_url() -> String {
    "https://fcplcat.fairfaxcounty.gov".to_string()
}

fn default_legacy_search_url() -> String {
    "https://fcplcat.fairfaxcounty.gov/uhtbin/cgisirsi/x/0/0/57/49".to_string()
}

fn default_image_client_id() -> String {
    "fairfaxpl".to_string()
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// Headless browser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Chrome/Chromium binary; auto-detected when unset
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Time given to the results page to render before it is read
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_window_height")]
    pub window_height: u32,

    #[serde(default = "default_timeout")]
    pub navigation_timeout_seconds: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            settle_delay_ms: default_settle_delay(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            navigation_timeout_seconds: default_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_settle_delay() -> u64 {
    1000
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

/// Live hold-count lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldsConfig {
    /// Fetch availability text for every surviving result
    #[serde(default)]
    pub enabled: bool,

    /// Upper bound on lookups per results page
    #[serde(default = "default_max_lookups")]
    pub max_lookups: usize,
}

impl Default for HoldsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_lookups: default_max_lookups(),
        }
    }
}

fn default_max_lookups() -> usize {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Load configuration from a file, with environment overrides on top
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

/// Get the configuration from environment overrides and defaults only
pub fn get_config() -> Result<Config, config::ConfigError> {
    config::Config::builder()
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()
}

/// Find a config file in the working directory or the user config directory
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("library-status").join("config.toml"))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.catalog.default, "modern-http");
        assert_eq!(config.browser.settle_delay_ms, 1000);
        assert!(config.browser.headless);
        assert!(!config.holds.enabled);
        assert_eq!(config.holds.max_lookups, 10);
    }

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(
            &path,
            r#"
[catalog]
default = "legacy"
base_url = "http://127.0.0.1:8080"

[holds]
enabled = true
max_lookups = 3

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.catalog.default, "legacy");
        assert_eq!(config.catalog.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.catalog.image_client_id, "fairfaxpl");
        assert!(config.holds.enabled);
        assert_eq!(config.holds.max_lookups, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.http.timeout_seconds, 30);
    }

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.holds.max_lookups = 4;
        config.browser.chrome_path = Some(PathBuf::from("/usr/bin/chromium"));
        config.save(&path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.holds.max_lookups, 4);
        assert_eq!(
            loaded.browser.chrome_path,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = load_config(Path::new("/nonexistent/library-status.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");
        std::fs::write(&path, "invalid = toml = content").unwrap();

        assert!(load_config(&path).is_err());
    }
}
