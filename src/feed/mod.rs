//! Feed traversal: discovery, dispatch and exhaustion.
//!
//! One [`FeedSession`] drives one feed on one page. The in-page observer
//! only marks and signals new post elements; the host-side receiver is the
//! authoritative FIFO queue, drained by a single consumer so at most one
//! extraction is ever in flight per session. After each item the consumer
//! re-polls the queue before waiting, so a burst of discoveries is drained
//! continuously rather than one per signal.
//!
//! State machine: `Idle → Scraping → (Exhausted | Stopped)`. Exhaustion is
//! "queue empty and no loading indicator after a scroll"; `Stopped` only via
//! [`FeedSession::stop`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::app::{Result, TrawlError};
use crate::config::Config;
use crate::domain::Post;
use crate::extract::{extract_author, extract_content, extract_metadata};
use crate::page::PageController;
use crate::sink::RecordSink;

const STOP_NAV_TIMEOUT: Duration = Duration::from_secs(30);
const BLANK_PAGE: &str = "about:blank";

/// Feed ordering, mapped onto the feed URL's sort parameter.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedSort {
    RecentActivity,
    Chronological,
    TopPosts,
}

impl FeedSort {
    pub fn as_param(self) -> &'static str {
        match self {
            FeedSort::RecentActivity => "RECENT_ACTIVITY",
            FeedSort::Chronological => "CHRONOLOGICAL",
            FeedSort::TopPosts => "TOP_POSTS",
        }
    }
}

/// Build the URL a feed identifier resolves to.
pub fn feed_url(base: &str, feed_id: &str, sort: Option<FeedSort>) -> String {
    let base = base.trim_end_matches('/');
    match sort {
        Some(sort) => format!("{base}/{feed_id}/?sorting_setting={}", sort.as_param()),
        None => format!("{base}/{feed_id}/"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Scraping,
    Exhausted,
    Stopped,
}

/// One traversal of one feed.
pub struct FeedSession<P: PageController> {
    page: P,
    config: Arc<Config>,
    feed_id: String,
    sort: Option<FeedSort>,
    sink: Option<Box<dyn RecordSink>>,
    stopped: AtomicBool,
    wake: Notify,
    state: Mutex<FeedState>,
}

impl<P: PageController> FeedSession<P> {
    pub fn new(
        page: P,
        config: Arc<Config>,
        feed_id: impl Into<String>,
        sort: Option<FeedSort>,
    ) -> Self {
        Self {
            page,
            config,
            feed_id: feed_id.into(),
            sort,
            sink: None,
            stopped: AtomicBool::new(false),
            wake: Notify::new(),
            state: Mutex::new(FeedState::Idle),
        }
    }

    /// Also persist every record through `sink`.
    pub fn with_sink(mut self, sink: Box<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn state(&self) -> FeedState {
        *self.state.lock().expect("feed state lock")
    }

    fn set_state(&self, state: FeedState) {
        *self.state.lock().expect("feed state lock") = state;
    }

    /// Drive the traversal to a terminal state.
    ///
    /// `on_post` receives every extracted record in discovery order, then
    /// exactly one `None` if the feed ran dry. Cancellation via [`stop`]
    /// never emits the `None`.
    ///
    /// [`stop`]: Self::stop
    pub async fn run<F>(&self, mut on_post: F) -> Result<FeedState>
    where
        F: FnMut(Option<Post>) + Send,
    {
        self.stopped.store(false, Ordering::SeqCst);
        self.set_state(FeedState::Scraping);

        let url = feed_url(&self.config.scrape.feed_base, &self.feed_id, self.sort);
        info!(url = %url, "opening feed");
        self.page.goto(&url, self.config.scrape.nav_timeout()).await?;

        if self.config.scrape.block_assets {
            self.page.block_assets().await?;
        }

        let selector_timeout = self.config.scrape.selector_timeout();
        let sel = &self.config.selectors.feed;

        // The feed name doubles as the "page has settled" landmark.
        let name_node = self.page.wait_for_selector(&sel.name, selector_timeout).await?;
        let feed_name = self.page.text(&name_node).await?;
        info!(feed = %feed_name, "feed opened");

        // First scroll nudge; afterwards every empty-queue check scrolls again.
        self.page.scroll_to_bottom().await?;
        let container = self
            .page
            .wait_for_selector(&sel.container, selector_timeout)
            .await?;
        let mut discovered = self
            .page
            .watch_feed(&sel.container, &self.config.selectors.post.element)
            .await?;

        let mut seen: HashSet<String> = HashSet::new();
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return self.release_stopped().await;
            }
            match discovered.try_recv() {
                Ok(handle) => {
                    self.handle_post(&handle, &mut seen, &mut on_post).await;
                }
                Err(TryRecvError::Empty) => {
                    self.page.scroll_to_bottom().await?;
                    let loading = self.page.query_within(&container, &sel.loading).await?;
                    if loading.is_none() {
                        // Exhausted. One final drain covers last-moment
                        // arrivals, then the single completion callback.
                        while let Ok(handle) = discovered.try_recv() {
                            self.handle_post(&handle, &mut seen, &mut on_post).await;
                        }
                        info!(posts = seen.len(), "feed exhausted");
                        on_post(None);
                        self.set_state(FeedState::Exhausted);
                        let _ = self
                            .page
                            .goto(BLANK_PAGE, self.config.scrape.nav_timeout())
                            .await;
                        return Ok(FeedState::Exhausted);
                    }
                    tokio::select! {
                        received = discovered.recv() => match received {
                            Some(handle) => {
                                self.handle_post(&handle, &mut seen, &mut on_post).await;
                            }
                            None => {
                                return Err(TrawlError::Page(
                                    "feed discovery stream closed".into(),
                                ));
                            }
                        },
                        _ = self.wake.notified() => {}
                    }
                }
                Err(TryRecvError::Disconnected) => {
                    return Err(TrawlError::Page("feed discovery stream closed".into()));
                }
            }
        }
    }

    /// Request cancellation. Takes effect at the consumer's next iteration
    /// boundary, never preempting an in-flight extraction, and never emits
    /// the completion callback. Returns whether the release navigation was
    /// observed; both outcomes are terminal.
    pub async fn stop(&self) -> bool {
        self.stopped.store(true, Ordering::SeqCst);
        // notify_one stores a permit, so a stop racing the consumer's park
        // still wakes it.
        self.wake.notify_one();
        self.page.wait_for_navigation(STOP_NAV_TIMEOUT).await.is_ok()
    }

    async fn release_stopped(&self) -> Result<FeedState> {
        debug!("feed traversal stopped, releasing page");
        self.set_state(FeedState::Stopped);
        let _ = self
            .page
            .goto(BLANK_PAGE, self.config.scrape.nav_timeout())
            .await;
        Ok(FeedState::Stopped)
    }

    async fn handle_post<F>(&self, handle: &P::Handle, seen: &mut HashSet<String>, on_post: &mut F)
    where
        F: FnMut(Option<Post>) + Send,
    {
        match self.extract_post(handle).await {
            Ok(post) => {
                if !seen.insert(post.id.clone()) {
                    debug!(id = %post.id, "duplicate discovery dropped");
                    return;
                }
                if let Some(ref sink) = self.sink {
                    if let Err(error) = sink.append(&post) {
                        warn!(id = %post.id, %error, "failed to persist post");
                    }
                }
                on_post(Some(post));
            }
            // Each dispatched item is independent; a failed one is skipped
            // and the traversal continues.
            Err(error) => warn!(%error, "post extraction failed, skipping"),
        }
    }

    async fn extract_post(&self, handle: &P::Handle) -> Result<Post> {
        let selectors = &self.config.selectors;
        let scrape = &self.config.scrape;

        let metadata = extract_metadata(
            &self.page,
            handle,
            selectors,
            &scrape.retry,
            scrape.parse_timestamps,
        )
        .await?;
        let author = extract_author(&self.page, handle, selectors).await?;
        let content = extract_content(&self.page, handle, selectors).await?;

        debug!(id = %metadata.id, "post extracted");
        Ok(Post {
            id: metadata.id,
            permalink: metadata.permalink,
            date: metadata.date,
            timestamp: metadata.timestamp,
            author_name: author.name,
            author_url: author.url,
            author_avatar: author.avatar,
            activity: author.activity,
            content_text: content.text,
            content_html: content.html,
            background: content.background,
            images: content.images,
            attachment_url: content.attachment_url,
            attachment_file: content.attachment_file,
        })
    }
}
