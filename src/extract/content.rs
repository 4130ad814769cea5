//! Post body and attachments.
//!
//! Unlike metadata extraction there is no outer retry here: absence of an
//! optional sub-element yields `None`/empty fields, and only real page
//! failures (timeouts, detached handles) propagate.

use std::time::Duration;

use crate::app::Result;
use crate::domain::{background_url, decode_share_url, FileAttachment};
use crate::page::{poll_until, PageController};
use crate::selectors::SelectorCatalog;

const EXPAND_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostContent {
    pub text: Option<String>,
    pub html: Option<String>,
    pub background: Option<String>,
    pub images: Vec<String>,
    pub attachment_url: Option<String>,
    pub attachment_file: Option<FileAttachment>,
}

/// Extract the post body (expanding truncated or folded text as needed) and
/// the attachment block.
pub async fn extract_content<P: PageController>(
    page: &P,
    post: &P::Handle,
    selectors: &SelectorCatalog,
) -> Result<PostContent> {
    let sel = &selectors.post;
    let text_sel = sel.text();

    let mut text_node = page.query_within(post, text_sel).await?;

    // Shared posts fold the original text behind a "see original" control.
    if text_node.is_none() {
        if let Some(reveal) = page.query_within(post, &sel.see_original).await? {
            page.click(&reveal).await?;
            poll_until("inline text", EXPAND_TIMEOUT, POLL_INTERVAL, || async move {
                Ok(page.query_within(post, text_sel).await?.is_some())
            })
            .await?;
            text_node = page.query_within(post, text_sel).await?;
        }
    }

    let exclusive = page.query_within(post, sel.text_only()).await?;

    let (text, html, background) = match (text_node, exclusive) {
        (Some(text_node), Some(_)) => {
            let background = match page.query_within(post, sel.background()).await? {
                Some(node) => page
                    .attribute(&node, "style")
                    .await?
                    .as_deref()
                    .and_then(background_url),
                None => None,
            };
            // Background posts render their text inside the styled wrapper.
            let target = match page.query_within(post, sel.background_text()).await? {
                Some(node) => node,
                None => text_node,
            };
            let target = &target;

            if let Some(see_more) = page.query_within(target, &sel.see_more).await? {
                let folded_len = page.text(target).await?.chars().count();
                page.click(&see_more).await?;
                poll_until("expanded text", EXPAND_TIMEOUT, POLL_INTERVAL, || async move {
                    Ok(page.text(target).await?.chars().count() != folded_len)
                })
                .await?;
            }

            (
                Some(page.text(target).await?),
                Some(page.inner_html(target).await?),
                background,
            )
        }
        // No exclusive text marker: a non-text post, not an error.
        _ => (None, None, None),
    };

    let attachment = page.query_within(post, sel.attachment()).await?;
    let marker = page.query_within(post, sel.attachment_marker()).await?;

    let (images, attachment_url, attachment_file) = match (attachment, marker) {
        (Some(block), Some(_)) => {
            let images = page.collect_attributes(&block, &sel.image, "src").await?;
            let url = match page.query_within(&block, &sel.outbound_link).await? {
                Some(node) => page
                    .attribute(&node, "href")
                    .await?
                    .map(|href| decode_share_url(&href)),
                None => None,
            };
            let file = match page.query_within(&block, &sel.file_link).await? {
                Some(node) => {
                    let name = page.attribute(&node, "aria-label").await?;
                    let href = page.attribute(&node, "href").await?;
                    name.zip(href).map(|(name, url)| FileAttachment { name, url })
                }
                None => None,
            };
            (images, url, file)
        }
        _ => (Vec::new(), None, None),
    };

    Ok(PostContent {
        text,
        html,
        background,
        images,
        attachment_url,
        attachment_file,
    })
}
