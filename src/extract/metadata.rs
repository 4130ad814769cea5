//! Post metadata from transient hover/tooltip state.
//!
//! The permalink and date only render while the permalink is hovered and
//! layout has settled, which makes every step racy against animation and
//! scroll state. Any failure restarts the whole sequence from the cursor
//! reset, up to the policy bound.

use std::time::Duration;

use tracing::debug;

use crate::app::{Result, TrawlError};
use crate::domain::{parse_timestamp, post_id, strip_query};
use crate::extract::RetryPolicy;
use crate::page::{poll_until, PageController};
use crate::selectors::SelectorCatalog;

const CURSOR_TIMEOUT: Duration = Duration::from_millis(200);
const HOVER_TIMEOUT: Duration = Duration::from_millis(500);
const TOOLTIP_TIMEOUT: Duration = Duration::from_millis(800);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq)]
pub struct PostMetadata {
    pub id: String,
    pub permalink: String,
    pub date: String,
    pub timestamp: Option<i64>,
}

/// Extract a post's identity, permalink and date, retrying transient UI
/// races per `retry`. Exhausting the bound yields
/// [`TrawlError::MetadataGaveUp`].
pub async fn extract_metadata<P: PageController>(
    page: &P,
    post: &P::Handle,
    selectors: &SelectorCatalog,
    retry: &RetryPolicy,
    parse_timestamps: bool,
) -> Result<PostMetadata> {
    let mut backoff = retry.initial_backoff();
    for attempt in 1..=retry.max_attempts {
        match extract_once(page, post, selectors, parse_timestamps).await {
            Ok(metadata) => {
                if attempt > 1 {
                    debug!(attempt, id = %metadata.id, "metadata extraction recovered");
                }
                return Ok(metadata);
            }
            Err(error) => {
                debug!(attempt, %error, "metadata extraction attempt failed");
                tokio::time::sleep(backoff).await;
                backoff = retry.next_backoff(backoff);
            }
        }
    }
    Err(TrawlError::MetadataGaveUp {
        attempts: retry.max_attempts,
    })
}

async fn extract_once<P: PageController>(
    page: &P,
    post: &P::Handle,
    selectors: &SelectorCatalog,
    parse_timestamps: bool,
) -> Result<PostMetadata> {
    let sel = &selectors.post;
    let link = page
        .query_within(post, &sel.permalink)
        .await?
        .ok_or_else(|| TrawlError::ElementNotFound(sel.permalink.clone()))?;
    let link = &link;

    // Park the cursor so a stale hover from the previous post cannot keep a
    // foreign tooltip alive, then hover the permalink and wait for the ARIA
    // linkage that carries the tooltip id.
    page.move_mouse(0.0, 0.0, CURSOR_TIMEOUT).await?;
    page.scroll_into_view(link).await?;
    page.hover(link, HOVER_TIMEOUT).await?;
    poll_until("tooltip linkage", TOOLTIP_TIMEOUT, POLL_INTERVAL, || async move {
        Ok(page
            .parent_attribute(link, "aria-describedby")
            .await?
            .is_some())
    })
    .await?;

    let tooltip_id = page
        .parent_attribute(link, "aria-describedby")
        .await?
        .ok_or_else(|| TrawlError::ElementNotFound("tooltip linkage".into()))?;
    let raw_date = page
        .text_by_id(&tooltip_id)
        .await?
        .ok_or_else(|| TrawlError::ElementNotFound(format!("tooltip #{tooltip_id}")))?;
    let date = raw_date.replacen("at ", "", 1);

    let href = page
        .attribute(link, "href")
        .await?
        .ok_or_else(|| TrawlError::ElementNotFound("permalink href".into()))?;
    let permalink = strip_query(&href);
    let id = post_id(&permalink)
        .ok_or_else(|| TrawlError::Page(format!("permalink has no id tail: {permalink}")))?;

    let timestamp = if parse_timestamps {
        parse_timestamp(&date)
    } else {
        None
    };

    // Park the cursor again so this tooltip cannot shadow the next post's.
    page.move_mouse(0.0, 0.0, CURSOR_TIMEOUT).await?;

    Ok(PostMetadata {
        id,
        permalink,
        date,
        timestamp,
    })
}
