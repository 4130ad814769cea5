//! The browser seam.
//!
//! [`PageController`] is everything the extraction engine and the login flow
//! need from a live page: navigation, element queries with explicit timeouts,
//! input simulation, cookie access and the feed discovery stream. The
//! production implementation drives Chromium over CDP ([`chrome`]); tests run
//! the same pipelines against a scripted in-memory page.

pub mod chrome;
#[cfg(test)]
pub(crate) mod mock;
pub mod scripts;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::app::{Result, TrawlError};

/// A cookie as persisted by the session store and replayed into the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: Option<f64>,
    pub http_only: bool,
    pub secure: bool,
}

/// Capabilities the scraper needs from a live browser page.
///
/// `Handle` is an opaque reference to one rendered element, valid until the
/// page detaches it. Handles are only ever used against the page that
/// produced them.
#[async_trait]
pub trait PageController: Send + Sync {
    type Handle: Send + Sync;

    /// Navigate and return the rendered document text.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    /// Wait for the next navigation to settle and return the resulting URL.
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<String>;

    /// Wait until an element matching `selector` exists.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<Self::Handle>;

    async fn query(&self, selector: &str) -> Result<Option<Self::Handle>>;

    async fn query_within(
        &self,
        node: &Self::Handle,
        selector: &str,
    ) -> Result<Option<Self::Handle>>;

    async fn text(&self, node: &Self::Handle) -> Result<String>;

    async fn inner_html(&self, node: &Self::Handle) -> Result<String>;

    async fn attribute(&self, node: &Self::Handle, name: &str) -> Result<Option<String>>;

    /// Read an attribute off the node's parent element.
    async fn parent_attribute(&self, node: &Self::Handle, name: &str) -> Result<Option<String>>;

    /// Collect `name` attributes of all descendants matching `selector`,
    /// in document order.
    async fn collect_attributes(
        &self,
        node: &Self::Handle,
        selector: &str,
        name: &str,
    ) -> Result<Vec<String>>;

    /// Text content of the element with the given DOM id, if any.
    async fn text_by_id(&self, dom_id: &str) -> Result<Option<String>>;

    async fn click(&self, node: &Self::Handle) -> Result<()>;

    async fn hover(&self, node: &Self::Handle, timeout: Duration) -> Result<()>;

    async fn focus(&self, selector: &str) -> Result<()>;

    /// Type into whatever currently holds focus.
    async fn type_text(&self, text: &str) -> Result<()>;

    async fn move_mouse(&self, x: f64, y: f64, timeout: Duration) -> Result<()>;

    async fn scroll_into_view(&self, node: &Self::Handle) -> Result<()>;

    /// Scroll the page down by the document height to provoke further
    /// lazy-loaded content.
    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Stop the page from fetching images, media and fonts.
    async fn block_assets(&self) -> Result<()>;

    async fn cookies(&self) -> Result<Vec<Cookie>>;

    async fn set_cookies(&self, cookies: Vec<Cookie>) -> Result<()>;

    /// Install mutation observation under `container_selector` and return the
    /// discovery stream: one handle per post element, in DOM-insertion order,
    /// covering both already-rendered and later-inserted posts. The page only
    /// notifies; the returned receiver is the authoritative FIFO queue.
    async fn watch_feed(
        &self,
        container_selector: &str,
        post_selector: &str,
    ) -> Result<mpsc::UnboundedReceiver<Self::Handle>>;
}

/// Poll `probe` until it reports true, at `interval`, failing with a
/// [`TrawlError::Wait`] once `timeout` has elapsed.
pub async fn poll_until<F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if probe().await? {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(TrawlError::Wait(timeout, what.to_string()));
        }
        tokio::time::sleep(interval).await;
    }
}
