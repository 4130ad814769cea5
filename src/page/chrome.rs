//! Chromium-backed [`PageController`] implementation over CDP.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, InsertTextParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self, BlockPattern, CookieParam, SetBlockedUrLsParams, TimeSinceEpoch,
};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EventBindingCalled};
use chromiumoxide::{Browser, Element, Page};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::app::{Result, TrawlError};
use crate::config::BrowserOptions;
use crate::page::{scripts, Cookie, PageController};

const FIND_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// URL patterns blocked when asset loading is disabled. Mirrors the resource
/// classes (images, media, fonts) that feed extraction never needs.
const ASSET_URL_PATTERNS: &[&str] = &[
    "*.jpg", "*.jpeg", "*.png", "*.gif", "*.webp", "*.svg", "*.ico", "*.mp4", "*.webm", "*.mp3",
    "*.woff", "*.woff2", "*.ttf", "*.otf",
];

fn cdp_err(error: impl std::fmt::Display) -> TrawlError {
    TrawlError::Page(error.to_string())
}

/// One browser tab driven over CDP.
pub struct ChromePage {
    page: Page,
}

impl ChromePage {
    /// Open a fresh tab with the configured user agent and viewport applied.
    pub async fn open(browser: &Browser, options: &BrowserOptions) -> Result<Self> {
        let page = browser.new_page("about:blank").await.map_err(cdp_err)?;

        if let Some(ref agent) = options.user_agent {
            page.set_user_agent(agent).await.map_err(cdp_err)?;
        }

        page.execute(
            SetDeviceMetricsOverrideParams::builder()
                .width(i64::from(options.width))
                .height(i64::from(options.height))
                .device_scale_factor(1.0)
                .mobile(false)
                .build()
                .map_err(TrawlError::Page)?,
        )
        .await
        .map_err(cdp_err)?;

        Ok(Self { page })
    }

    async fn dispatch_mouse_move(&self, x: f64, y: f64) -> Result<()> {
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(x)
            .y(y)
            .build()
            .map_err(TrawlError::Page)?;
        self.page.execute(params).await.map_err(cdp_err)?;
        Ok(())
    }
}

#[async_trait]
impl PageController for ChromePage {
    type Handle = Element;

    async fn goto(&self, url: &str, timeout: Duration) -> Result<String> {
        let navigate = async {
            self.page.goto(url).await.map_err(cdp_err)?;
            self.page.wait_for_navigation().await.map_err(cdp_err)?;
            self.page.content().await.map_err(cdp_err)
        };
        tokio::time::timeout(timeout, navigate)
            .await
            .map_err(|_| TrawlError::Wait(timeout, format!("navigation to {url}")))?
    }

    async fn current_url(&self) -> Result<String> {
        self.page
            .url()
            .await
            .map_err(cdp_err)?
            .ok_or_else(|| TrawlError::Page("page has no URL".into()))
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<String> {
        let wait = async {
            self.page.wait_for_navigation().await.map_err(cdp_err)?;
            self.current_url().await
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| TrawlError::Wait(timeout, "navigation".into()))?
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<Element> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(TrawlError::Wait(timeout, format!("selector {selector}")));
            }
            tokio::time::sleep(FIND_POLL_INTERVAL).await;
        }
    }

    async fn query(&self, selector: &str) -> Result<Option<Element>> {
        // Absence and query failure both surface as Err from CDP; either way
        // the element is not usable, which is the None case.
        Ok(self.page.find_element(selector).await.ok())
    }

    async fn query_within(&self, node: &Element, selector: &str) -> Result<Option<Element>> {
        Ok(node.find_element(selector).await.ok())
    }

    async fn text(&self, node: &Element) -> Result<String> {
        Ok(node
            .inner_text()
            .await
            .map_err(cdp_err)?
            .unwrap_or_default())
    }

    async fn inner_html(&self, node: &Element) -> Result<String> {
        Ok(node
            .inner_html()
            .await
            .map_err(cdp_err)?
            .unwrap_or_default())
    }

    async fn attribute(&self, node: &Element, name: &str) -> Result<Option<String>> {
        node.attribute(name).await.map_err(cdp_err)
    }

    async fn parent_attribute(&self, node: &Element, name: &str) -> Result<Option<String>> {
        let returns = node
            .call_js_fn(scripts::parent_attribute_fn(name), false)
            .await
            .map_err(cdp_err)?;
        Ok(returns
            .result
            .value
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    async fn collect_attributes(
        &self,
        node: &Element,
        selector: &str,
        name: &str,
    ) -> Result<Vec<String>> {
        let returns = node
            .call_js_fn(scripts::collect_attributes_fn(selector, name), false)
            .await
            .map_err(cdp_err)?;
        match returns.result.value {
            Some(serde_json::Value::Array(values)) => Ok(values
                .into_iter()
                .filter_map(|value| value.as_str().map(str::to_string))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn text_by_id(&self, dom_id: &str) -> Result<Option<String>> {
        let result = self
            .page
            .evaluate(scripts::text_by_id(dom_id))
            .await
            .map_err(cdp_err)?;
        Ok(result
            .value()
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    async fn click(&self, node: &Element) -> Result<()> {
        node.click().await.map_err(cdp_err)?;
        Ok(())
    }

    async fn hover(&self, node: &Element, timeout: Duration) -> Result<()> {
        let hover = async {
            node.scroll_into_view().await.map_err(cdp_err)?;
            let point = node.clickable_point().await.map_err(cdp_err)?;
            self.dispatch_mouse_move(point.x, point.y).await
        };
        tokio::time::timeout(timeout, hover)
            .await
            .map_err(|_| TrawlError::Wait(timeout, "hover".into()))?
    }

    async fn focus(&self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .map_err(cdp_err)?
            .focus()
            .await
            .map_err(cdp_err)?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(cdp_err)?;
        Ok(())
    }

    async fn move_mouse(&self, x: f64, y: f64, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.dispatch_mouse_move(x, y))
            .await
            .map_err(|_| TrawlError::Wait(timeout, "mouse move".into()))?
    }

    async fn scroll_into_view(&self, node: &Element) -> Result<()> {
        node.scroll_into_view().await.map_err(cdp_err)?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page
            .evaluate(scripts::SCROLL_TO_BOTTOM)
            .await
            .map_err(cdp_err)?;
        Ok(())
    }

    async fn block_assets(&self) -> Result<()> {
        let patterns: Vec<BlockPattern> = ASSET_URL_PATTERNS
            .iter()
            .map(|pattern| BlockPattern::new((*pattern).to_string(), true))
            .collect();
        self.page
            .execute(SetBlockedUrLsParams::builder().url_patterns(patterns).build())
            .await
            .map_err(cdp_err)?;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        let cookies = self.page.get_cookies().await.map_err(cdp_err)?;
        Ok(cookies.into_iter().map(cookie_from_cdp).collect())
    }

    async fn set_cookies(&self, cookies: Vec<Cookie>) -> Result<()> {
        for cookie in cookies {
            let param = cookie_to_param(cookie)?;
            self.page.set_cookie(param).await.map_err(cdp_err)?;
        }
        Ok(())
    }

    async fn watch_feed(
        &self,
        container_selector: &str,
        post_selector: &str,
    ) -> Result<mpsc::UnboundedReceiver<Element>> {
        // The binding must exist before the install script runs: the initial
        // sweep over already-rendered posts signals synchronously.
        let mut events = self
            .page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(cdp_err)?;
        self.page
            .execute(AddBindingParams::new(scripts::DISCOVERY_BINDING))
            .await
            .map_err(cdp_err)?;

        let installed = self
            .page
            .evaluate(scripts::observer_install(container_selector, post_selector))
            .await
            .map_err(cdp_err)?;
        if installed.value().and_then(serde_json::Value::as_bool) != Some(true) {
            return Err(TrawlError::ElementNotFound(container_selector.to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let page = self.page.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.name != scripts::DISCOVERY_BINDING {
                    continue;
                }
                let selector = format!("[{}=\"{}\"]", scripts::SEQ_ATTRIBUTE, event.payload);
                match page.find_element(&selector).await {
                    Ok(element) => {
                        if tx.send(element).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!(selector = %selector, error = %error, "discovered post vanished before pickup");
                    }
                }
            }
            debug!("feed discovery stream closed");
        });

        Ok(rx)
    }
}

fn cookie_from_cdp(cookie: network::Cookie) -> Cookie {
    Cookie {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires: (cookie.expires >= 0.0).then_some(cookie.expires),
        http_only: cookie.http_only,
        secure: cookie.secure,
    }
}

fn cookie_to_param(cookie: Cookie) -> Result<CookieParam> {
    let mut builder = CookieParam::builder()
        .name(cookie.name)
        .value(cookie.value)
        .domain(cookie.domain)
        .path(cookie.path)
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    builder.build().map_err(TrawlError::Page)
}
