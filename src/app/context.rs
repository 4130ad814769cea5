//! Top-level context: one launched browser, handing out pages, login flows
//! and feed sessions that all share its cookie jar.

use std::sync::Arc;

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tracing::{debug, info};

use crate::app::error::{Result, TrawlError};
use crate::auth::Login;
use crate::config::Config;
use crate::feed::{FeedSession, FeedSort};
use crate::page::chrome::ChromePage;
use crate::page::PageController;
use crate::session::{initial_cookies, FsSessionStore};

pub struct Trawler {
    browser: Browser,
    config: Arc<Config>,
}

impl Trawler {
    /// Launch the browser per the configured options.
    pub async fn launch(config: Config) -> Result<Self> {
        let options = &config.browser;
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer");

        if !options.headless {
            builder = builder.with_head();
        }
        if options.maximized && !options.headless {
            builder = builder.arg("--start-maximized");
        } else {
            builder = builder.window_size(options.width, options.height);
        }
        if let Some(ref executable) = options.executable {
            builder = builder.chrome_executable(executable);
        }

        let browser_config = builder.build().map_err(TrawlError::Browser)?;
        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            TrawlError::Browser(format!(
                "failed to launch browser: {e}. Is Chrome or Chromium installed and in PATH?"
            ))
        })?;

        // Drain browser events for the lifetime of the connection.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(error) = event {
                    debug!(%error, "browser handler error");
                }
            }
        });

        info!(headless = options.headless, "browser launched");
        Ok(Self {
            browser,
            config: Arc::new(config),
        })
    }

    /// Open a fresh tab with the configured viewport, user agent and the
    /// stored session cookies applied.
    pub async fn page(&self) -> Result<ChromePage> {
        let page = ChromePage::open(&self.browser, &self.config.browser).await?;
        if let Some(cookies) = initial_cookies(&self.config.session, &FsSessionStore)? {
            debug!(count = cookies.len(), "replaying stored session cookies");
            page.set_cookies(cookies).await?;
        }
        Ok(page)
    }

    /// Start a login flow on a fresh page.
    pub async fn login(&self) -> Result<Login<ChromePage, FsSessionStore>> {
        let page = self.page().await?;
        Ok(Login::new(page, FsSessionStore, self.config.clone()))
    }

    /// Create a feed session for `feed_id` on a fresh page.
    pub async fn feed(
        &self,
        feed_id: &str,
        sort: Option<FeedSort>,
    ) -> Result<FeedSession<ChromePage>> {
        let page = self.page().await?;
        Ok(FeedSession::new(page, self.config.clone(), feed_id, sort))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| TrawlError::Browser(e.to_string()))?;
        Ok(())
    }
}
