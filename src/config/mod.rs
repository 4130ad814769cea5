//! Configuration management.
//!
//! Configuration is read from `~/.config/trawl/config.toml` at startup.
//! Every section and field is optional; missing values fall back to the
//! defaults below. CLI flags override file values where they overlap.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::{Result, TrawlError};
use crate::extract::RetryPolicy;
use crate::selectors::SelectorCatalog;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserOptions,
    pub session: SessionOptions,
    pub scrape: ScrapeOptions,
    pub selectors: SelectorCatalog,
}

impl Config {
    /// Load configuration from `path`, or from the default location when
    /// `None`. A missing file yields the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| TrawlError::Config(format!("{}: {e}", path.display())))?;
        config.selectors.rebuild();
        Ok(config)
    }

    /// Default config file path: `~/.config/trawl/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| TrawlError::Config("could not find config directory".into()))?;
        Ok(config_dir.join("trawl").join("config.toml"))
    }
}

/// Browser launch and tab options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    /// Run without a visible window (default: true). Headless runs are also
    /// immune to the cursor interference that breaks hover extraction.
    pub headless: bool,

    /// Viewport width in pixels (default: 700)
    pub width: u32,

    /// Viewport height in pixels (default: 800)
    pub height: u32,

    /// Start the window maximized instead of sized (headful only)
    pub maximized: bool,

    /// User agent override
    pub user_agent: Option<String>,

    /// Path to the Chrome/Chromium executable (None for auto-detection)
    pub executable: Option<PathBuf>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            width: 700,
            height: 800,
            maximized: false,
            user_agent: None,
            executable: None,
        }
    }
}

/// Session and cookie options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Application root; the login probe navigates here.
    pub base_url: String,

    /// Cookie persistence destination. `None` disables persistence.
    pub cookies_file: Option<PathBuf>,

    /// Inline cookie JSON, taking precedence over `cookies_file` as the
    /// session source.
    pub cookies_json: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            base_url: "https://www.facebook.com".into(),
            cookies_file: Some(PathBuf::from("trawl_cookies.json")),
            cookies_json: None,
        }
    }
}

/// Feed traversal options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeOptions {
    /// Base URL under which feed identifiers resolve.
    pub feed_base: String,

    /// Block image/media/font requests for faster loading (default: true)
    pub block_assets: bool,

    /// Derive epoch timestamps from tooltip dates (default: true)
    pub parse_timestamps: bool,

    /// Navigation timeout in seconds (default: 600; feed pages can be slow
    /// to settle under load)
    pub nav_timeout_secs: u64,

    /// Element wait timeout in seconds (default: 30)
    pub selector_timeout_secs: u64,

    /// Retry policy for the hover-dependent metadata extraction.
    pub retry: RetryPolicy,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            feed_base: "https://www.facebook.com/groups".into(),
            block_assets: true,
            parse_timestamps: true,
            nav_timeout_secs: 600,
            selector_timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl ScrapeOptions {
    pub fn nav_timeout(&self) -> Duration {
        Duration::from_secs(self.nav_timeout_secs)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }
}
