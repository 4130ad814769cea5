//! Scripted in-memory [`PageController`] for tests.
//!
//! Nodes form a flat table keyed by handle; queries resolve through
//! selector-keyed child maps, so tests arrange exactly the DOM shape a
//! scenario needs and nothing else. Click effects and navigation events are
//! scripted per node.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::app::{Result, TrawlError};
use crate::page::{Cookie, PageController};
use crate::selectors::SelectorCatalog;

/// Longest a mock navigation wait will block, regardless of the caller's
/// timeout, to keep tests fast.
const MAX_NAV_WAIT: Duration = Duration::from_millis(200);
const NAV_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub(crate) enum MockEffect {
    SetText {
        node: u64,
        text: String,
        html: String,
    },
    AddChild {
        parent: u64,
        selector: String,
        child: u64,
    },
    /// Navigate to the nth URL on the nth click of this node (sticking to
    /// the last one once exhausted).
    NavigateNext { urls: Vec<String> },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockNode {
    pub children: HashMap<String, u64>,
    pub text: String,
    pub html: String,
    pub attributes: HashMap<String, String>,
    pub parent_attributes: HashMap<String, String>,
    pub collected: HashMap<(String, String), Vec<String>>,
    pub hover_failures: u32,
    pub on_click: Vec<MockEffect>,
    pub click_count: u64,
}

#[derive(Default)]
struct MockState {
    nodes: HashMap<u64, MockNode>,
    page_nodes: HashMap<String, u64>,
    texts_by_id: HashMap<String, String>,
    bodies: HashMap<String, String>,
    cookies: Vec<Cookie>,
    current_url: String,
    visited: Vec<String>,
    focused: Option<String>,
    typed: Vec<(String, String)>,
    clicked: Vec<u64>,
    mouse_moves: u32,
    assets_blocked: bool,
}

pub(crate) struct MockPage {
    state: Mutex<MockState>,
    next_id: AtomicU64,
    /// Completed navigations not yet observed by `wait_for_navigation`.
    nav_queue: Mutex<VecDeque<String>>,
    feed_rx: Mutex<Option<mpsc::UnboundedReceiver<u64>>>,
}

impl MockPage {
    pub(crate) fn new() -> Self {
        let state = MockState {
            current_url: "about:blank".into(),
            ..MockState::default()
        };
        Self {
            state: Mutex::new(state),
            next_id: AtomicU64::new(1),
            nav_queue: Mutex::new(VecDeque::new()),
            feed_rx: Mutex::new(None),
        }
    }

    fn record_navigation(&self, url: String) {
        self.nav_queue.lock().expect("nav lock").push_back(url);
    }

    /// Forget completed-but-unobserved navigations, so a subsequent
    /// `wait_for_navigation` only sees future ones.
    pub(crate) fn drain_navigations(&self) {
        self.nav_queue.lock().expect("nav lock").clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock page lock")
    }

    pub(crate) fn add_node(&self, node: MockNode) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock().nodes.insert(id, node);
        id
    }

    pub(crate) fn set_page_node(&self, selector: &str, node: u64) {
        self.lock().page_nodes.insert(selector.to_string(), node);
    }

    pub(crate) fn link_child(&self, parent: u64, selector: &str, child: u64) {
        self.lock()
            .nodes
            .get_mut(&parent)
            .expect("unknown parent node")
            .children
            .insert(selector.to_string(), child);
    }

    pub(crate) fn unlink_child(&self, parent: u64, selector: &str) {
        self.lock()
            .nodes
            .get_mut(&parent)
            .expect("unknown parent node")
            .children
            .remove(selector);
    }

    pub(crate) fn set_hover_failures(&self, node: u64, failures: u32) {
        self.lock()
            .nodes
            .get_mut(&node)
            .expect("unknown node")
            .hover_failures = failures;
    }

    pub(crate) fn set_tooltip(&self, dom_id: &str, text: &str) {
        self.lock()
            .texts_by_id
            .insert(dom_id.to_string(), text.to_string());
    }

    pub(crate) fn set_body(&self, url: &str, body: &str) {
        self.lock().bodies.insert(url.to_string(), body.to_string());
    }

    pub(crate) fn seed_cookies(&self, cookies: Vec<Cookie>) {
        self.lock().cookies = cookies;
    }

    pub(crate) fn cookies_snapshot(&self) -> Vec<Cookie> {
        self.lock().cookies.clone()
    }

    pub(crate) fn visited(&self) -> Vec<String> {
        self.lock().visited.clone()
    }

    pub(crate) fn typed(&self) -> Vec<(String, String)> {
        self.lock().typed.clone()
    }

    pub(crate) fn clicked(&self) -> Vec<u64> {
        self.lock().clicked.clone()
    }

    pub(crate) fn mouse_moves(&self) -> u32 {
        self.lock().mouse_moves
    }

    pub(crate) fn assets_blocked(&self) -> bool {
        self.lock().assets_blocked
    }

    /// Register the feed discovery channel and hand back the sender; tests
    /// push handles to simulate in-page discoveries.
    pub(crate) fn feed_channel(&self) -> mpsc::UnboundedSender<u64> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed_rx.lock().expect("mock feed lock") = Some(rx);
        tx
    }

    fn apply_effects(&self, effects: Vec<MockEffect>, nth_click: usize) {
        let mut navigations = Vec::new();
        {
            let mut state = self.lock();
            for effect in effects {
                match effect {
                    MockEffect::SetText { node, text, html } => {
                        if let Some(node) = state.nodes.get_mut(&node) {
                            node.text = text;
                            node.html = html;
                        }
                    }
                    MockEffect::AddChild {
                        parent,
                        selector,
                        child,
                    } => {
                        if let Some(parent) = state.nodes.get_mut(&parent) {
                            parent.children.insert(selector, child);
                        }
                    }
                    MockEffect::NavigateNext { urls } => {
                        let url = urls
                            .get(nth_click.min(urls.len().saturating_sub(1)))
                            .cloned()
                            .unwrap_or_default();
                        state.current_url = url.clone();
                        state.visited.push(url.clone());
                        navigations.push(url);
                    }
                }
            }
        }
        for url in navigations {
            self.record_navigation(url);
        }
    }

    fn node(&self, id: u64) -> Result<MockNode> {
        self.lock()
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| TrawlError::Page(format!("unknown node {id}")))
    }
}

#[async_trait]
impl PageController for MockPage {
    type Handle = u64;

    async fn goto(&self, url: &str, _timeout: Duration) -> Result<String> {
        let body = {
            let mut state = self.lock();
            state.current_url = url.to_string();
            state.visited.push(url.to_string());
            state.bodies.get(url).cloned().unwrap_or_default()
        };
        self.record_navigation(url.to_string());
        Ok(body)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.lock().current_url.clone())
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<String> {
        let deadline = tokio::time::Instant::now() + timeout.min(MAX_NAV_WAIT);
        loop {
            if let Some(url) = self.nav_queue.lock().expect("nav lock").pop_front() {
                return Ok(url);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(TrawlError::Wait(timeout, "navigation".into()));
            }
            tokio::time::sleep(NAV_POLL_INTERVAL).await;
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<u64> {
        self.lock()
            .page_nodes
            .get(selector)
            .copied()
            .ok_or_else(|| TrawlError::Wait(timeout, format!("selector {selector}")))
    }

    async fn query(&self, selector: &str) -> Result<Option<u64>> {
        Ok(self.lock().page_nodes.get(selector).copied())
    }

    async fn query_within(&self, node: &u64, selector: &str) -> Result<Option<u64>> {
        Ok(self.node(*node)?.children.get(selector).copied())
    }

    async fn text(&self, node: &u64) -> Result<String> {
        Ok(self.node(*node)?.text)
    }

    async fn inner_html(&self, node: &u64) -> Result<String> {
        Ok(self.node(*node)?.html)
    }

    async fn attribute(&self, node: &u64, name: &str) -> Result<Option<String>> {
        Ok(self.node(*node)?.attributes.get(name).cloned())
    }

    async fn parent_attribute(&self, node: &u64, name: &str) -> Result<Option<String>> {
        Ok(self.node(*node)?.parent_attributes.get(name).cloned())
    }

    async fn collect_attributes(
        &self,
        node: &u64,
        selector: &str,
        name: &str,
    ) -> Result<Vec<String>> {
        Ok(self
            .node(*node)?
            .collected
            .get(&(selector.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn text_by_id(&self, dom_id: &str) -> Result<Option<String>> {
        Ok(self.lock().texts_by_id.get(dom_id).cloned())
    }

    async fn click(&self, node: &u64) -> Result<()> {
        let (effects, nth_click) = {
            let mut state = self.lock();
            state.clicked.push(*node);
            let target = state
                .nodes
                .get_mut(node)
                .ok_or_else(|| TrawlError::Page(format!("unknown node {node}")))?;
            let nth_click = target.click_count as usize;
            target.click_count += 1;
            (target.on_click.clone(), nth_click)
        };
        self.apply_effects(effects, nth_click);
        Ok(())
    }

    async fn hover(&self, node: &u64, timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        let node = state
            .nodes
            .get_mut(node)
            .ok_or_else(|| TrawlError::Page(format!("unknown node {node}")))?;
        if node.hover_failures > 0 {
            node.hover_failures -= 1;
            return Err(TrawlError::Wait(timeout, "hover".into()));
        }
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<()> {
        self.lock().focused = Some(selector.to_string());
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        let mut state = self.lock();
        let target = state.focused.clone().unwrap_or_default();
        state.typed.push((target, text.to_string()));
        Ok(())
    }

    async fn move_mouse(&self, _x: f64, _y: f64, _timeout: Duration) -> Result<()> {
        self.lock().mouse_moves += 1;
        Ok(())
    }

    async fn scroll_into_view(&self, _node: &u64) -> Result<()> {
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        Ok(())
    }

    async fn block_assets(&self) -> Result<()> {
        self.lock().assets_blocked = true;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        Ok(self.lock().cookies.clone())
    }

    async fn set_cookies(&self, cookies: Vec<Cookie>) -> Result<()> {
        self.lock().cookies = cookies;
        Ok(())
    }

    async fn watch_feed(
        &self,
        _container_selector: &str,
        _post_selector: &str,
    ) -> Result<mpsc::UnboundedReceiver<u64>> {
        self.feed_rx
            .lock()
            .expect("mock feed lock")
            .take()
            .ok_or_else(|| TrawlError::Page("no feed channel scripted".into()))
    }
}

/// Build a complete post node: permalink link with a tooltip-linked parent,
/// and a primary author. Returns the post handle.
pub(crate) fn scripted_post(
    page: &MockPage,
    catalog: &SelectorCatalog,
    seq: u64,
    author: &str,
) -> u64 {
    let tooltip_id = format!("tooltip-{seq}");
    let link = page.add_node(MockNode {
        attributes: HashMap::from([(
            "href".to_string(),
            format!("https://example.com/groups/g/posts/{seq}/?ref=feed"),
        )]),
        parent_attributes: HashMap::from([("aria-describedby".to_string(), tooltip_id.clone())]),
        ..MockNode::default()
    });
    page.set_tooltip(&tooltip_id, "Monday, June 5, 2023 at 3:14 PM");

    let author_node = page.add_node(MockNode {
        text: author.to_string(),
        attributes: HashMap::from([(
            "href".to_string(),
            format!("https://example.com/{}?ref=feed", author.to_lowercase()),
        )]),
        ..MockNode::default()
    });

    let post = page.add_node(MockNode::default());
    page.link_child(post, &catalog.post.permalink, link);
    page.link_child(post, &catalog.post.author_name, author_node);
    post
}

/// The permalink link node of a scripted post, for tests that tweak it.
pub(crate) fn scripted_post_link(page: &MockPage, catalog: &SelectorCatalog, post: u64) -> u64 {
    page.lock()
        .nodes
        .get(&post)
        .expect("unknown post node")
        .children
        .get(&catalog.post.permalink)
        .copied()
        .expect("post has no permalink link")
}
