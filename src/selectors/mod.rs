//! Named selector fragments, grouped by semantic role.
//!
//! Selector *values* are configuration, not algorithm: the defaults below
//! match the markup the scraper currently targets, and every one of them can
//! be overridden from the `[selectors]` section of the config file. Composite
//! selectors rooted at the post content block are derived once, when the
//! catalog is built, into plain immutable strings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorCatalog {
    pub login: LoginSelectors,
    pub feed: FeedSelectors,
    pub post: PostSelectors,
}

impl Default for SelectorCatalog {
    fn default() -> Self {
        Self {
            login: LoginSelectors::default(),
            feed: FeedSelectors::default(),
            post: PostSelectors::default(),
        }
    }
}

impl SelectorCatalog {
    /// Recompute the derived post selectors. Must be called after
    /// deserializing a catalog so overrides of the content root propagate.
    pub fn rebuild(&mut self) {
        self.post.derived = DerivedSelectors::from_root(&self.post.content_root);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSelectors {
    pub form: String,
    pub email: String,
    pub password: String,
    pub submit: String,
    pub consent_accept: String,
    pub two_factor_form: String,
    pub code_input: String,
    pub code_submit: String,
    /// Element that only renders once the post-login page has settled.
    pub landmark: String,
    /// Body substring present on anonymous pages and absent once logged in.
    pub anonymous_marker: String,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            form: "form".into(),
            email: "input#email".into(),
            password: "input[type=password]".into(),
            submit: "button[data-testid=royal_login_button]".into(),
            consent_accept: "button[data-cookiebanner=accept_button]".into(),
            two_factor_form: "form.checkpoint".into(),
            code_input: "input[name=approvals_code]".into(),
            code_submit: "button#checkpointSubmitButton".into(),
            landmark: "div[data-pagelet=Stories]".into(),
            anonymous_marker: "<meta name=\"description\"".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSelectors {
    /// Heading that carries the feed's display name.
    pub name: String,
    /// Subtree under which post elements are lazily appended.
    pub container: String,
    /// Transient element shown while more content is being fetched; its
    /// absence after a scroll is the exhaustion signal.
    pub loading: String,
}

impl Default for FeedSelectors {
    fn default() -> Self {
        Self {
            name: "h1[dir=auto] span[dir=auto]".into(),
            container: "div[role=feed]".into(),
            loading: "div[role=progressbar]".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostSelectors {
    pub element: String,
    pub permalink: String,
    pub author_name: String,
    pub author_name_alt: String,
    pub author_avatar: String,
    pub activity: String,
    /// Root of the content block; the derived selectors below hang off it.
    pub content_root: String,
    pub see_more: String,
    pub see_original: String,
    pub image: String,
    pub outbound_link: String,
    pub file_link: String,
    #[serde(skip)]
    derived: DerivedSelectors,
}

impl Default for PostSelectors {
    fn default() -> Self {
        let mut selectors = Self {
            element: "div[role=article][aria-labelledby]".into(),
            permalink: "span[dir=auto] > span a".into(),
            author_name: ":is(h2, h3, h4) span a".into(),
            author_name_alt: ":is(h2, h3, h4) strong".into(),
            author_avatar: "svg image".into(),
            activity: ":is(h2, h3, h4)".into(),
            content_root: "div:not([class]) > div:not([class]):nth-child(3)".into(),
            see_more: "div[role=button]".into(),
            see_original: "blockquote span + div[role=button]".into(),
            image: "img".into(),
            outbound_link: "a[target=_blank]".into(),
            file_link: "a[aria-label][role=link]".into(),
            derived: DerivedSelectors::default(),
        };
        selectors.derived = DerivedSelectors::from_root(&selectors.content_root);
        selectors
    }
}

impl PostSelectors {
    /// Inline text node of the post body.
    pub fn text(&self) -> &str {
        &self.derived.text
    }

    /// Marker that the text node is the exclusive content (a text post).
    pub fn text_only(&self) -> &str {
        &self.derived.text_only
    }

    /// Styled background wrapper for background-text posts.
    pub fn background(&self) -> &str {
        &self.derived.background
    }

    /// Text node nested inside the styled background wrapper.
    pub fn background_text(&self) -> &str {
        &self.derived.background_text
    }

    /// Attachment block at the tail of the content root.
    pub fn attachment(&self) -> &str {
        &self.derived.attachment
    }

    /// Marker child distinguishing a real attachment block.
    pub fn attachment_marker(&self) -> &str {
        &self.derived.attachment_marker
    }
}

#[derive(Debug, Clone, Default, Serialize)]
struct DerivedSelectors {
    text: String,
    text_only: String,
    background: String,
    background_text: String,
    attachment: String,
    attachment_marker: String,
}

impl DerivedSelectors {
    fn from_root(root: &str) -> Self {
        let text = format!("{root} > div:first-child");
        let background = format!("{text}[class] div[class][style]");
        Self {
            text_only: format!("{text} > div:only-child"),
            background_text: format!("{background} > div:nth-child(2)"),
            attachment: format!("{root} > div:last-child[class][id]"),
            attachment_marker: format!("{root} > div:last-child[class][id] > :nth-last-child(2)"),
            text,
            background,
        }
    }
}
