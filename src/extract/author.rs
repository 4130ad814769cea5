//! Author identity and activity annotation.

use crate::app::{Result, TrawlError};
use crate::domain::strip_query;
use crate::page::PageController;
use crate::selectors::SelectorCatalog;

#[derive(Debug, Clone, PartialEq)]
pub struct PostAuthor {
    pub name: String,
    pub url: Option<String>,
    pub avatar: Option<String>,
    pub activity: Option<String>,
}

/// Extract the post author. Only the name is required; profile URL, avatar
/// and activity annotation are all optional markup.
pub async fn extract_author<P: PageController>(
    page: &P,
    post: &P::Handle,
    selectors: &SelectorCatalog,
) -> Result<PostAuthor> {
    let sel = &selectors.post;

    // Not every post links the author's profile; the fallback heading
    // carries the name only.
    let (name, url) = if let Some(node) = page.query_within(post, &sel.author_name).await? {
        let name = page.text(&node).await?;
        let url = page
            .attribute(&node, "href")
            .await?
            .map(|href| strip_query(&href));
        (name, url)
    } else if let Some(node) = page.query_within(post, &sel.author_name_alt).await? {
        (page.text(&node).await?, None)
    } else {
        return Err(TrawlError::ElementNotFound(sel.author_name.clone()));
    };

    let avatar = match page.query_within(post, &sel.author_avatar).await? {
        Some(node) => page.attribute(&node, "xlink:href").await?,
        None => None,
    };

    // The heading reads "<author> <annotation>"; whatever follows the name
    // is the activity annotation.
    let activity = match page.query_within(post, &sel.activity).await? {
        Some(node) => {
            let text = page.text(&node).await?;
            let rest = text.strip_prefix(name.as_str()).unwrap_or("").trim();
            (!rest.is_empty()).then(|| rest.to_string())
        }
        None => None,
    };

    Ok(PostAuthor {
        name,
        url,
        avatar,
        activity,
    })
}
