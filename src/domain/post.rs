use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use url::Url;

/// A file attachment exposed through an anchor's accessible label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub name: String,
    pub url: String,
}

/// One extracted feed post. This is also the sink's on-disk record format,
/// hence the camelCase field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Tail of the normalized permalink; unique within one traversal.
    pub id: String,
    /// Absolute permalink with the query string stripped.
    pub permalink: String,
    /// Date string as rendered by the site's hover tooltip.
    pub date: String,
    /// Epoch seconds parsed from `date`, when parsing is enabled and succeeds.
    pub timestamp: Option<i64>,
    pub author_name: String,
    pub author_url: Option<String>,
    pub author_avatar: Option<String>,
    /// Contextual annotation beyond the author name ("shared a link", ...).
    pub activity: Option<String>,
    pub content_text: Option<String>,
    pub content_html: Option<String>,
    /// Background image URL for styled-text posts.
    pub background: Option<String>,
    pub images: Vec<String>,
    pub attachment_url: Option<String>,
    pub attachment_file: Option<FileAttachment>,
}

impl Post {
    /// A post either carries a textual body (`content_text` set) or none at
    /// all (both content fields unset). The extractor upholds this; the
    /// accessor exists so consumers can branch without touching both fields.
    pub fn is_text_bearing(&self) -> bool {
        self.content_text.is_some()
    }
}

/// Drop the query string and any trailing slash from a link target.
/// Shared by permalink and author-URL normalization.
pub fn strip_query(href: &str) -> String {
    let trimmed = match href.find('?') {
        Some(idx) => &href[..idx],
        None => href,
    };
    trimmed.trim_end_matches('/').to_string()
}

/// Derive a post's stable identity from its normalized permalink: the text
/// after the last path separator. `None` when the permalink has no separator
/// or an empty tail.
pub fn post_id(permalink: &str) -> Option<String> {
    let tail = permalink.rsplit('/').next()?;
    (!tail.is_empty() && tail.len() < permalink.len()).then(|| tail.to_string())
}

const DATE_FORMATS: &[&str] = &[
    "%A, %B %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%A, %d %B %Y %H:%M",
    "%d %B %Y %H:%M",
];

/// Best-effort conversion of a tooltip date string to epoch seconds.
///
/// The rendered string is whatever the site's locale produced, so this tries
/// a fixed list of formats and gives up with `None`. The string is read as
/// UTC; the site renders wall-clock time without a zone.
pub fn parse_timestamp(date: &str) -> Option<i64> {
    let cleaned = date.trim();
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Some(parsed.and_utc().timestamp());
        }
    }
    None
}

/// Pull the quoted argument of a CSS `url("...")` declaration out of an
/// inline style string.
pub fn background_url(style: &str) -> Option<String> {
    let start = style.find("url(\"")? + "url(\"".len();
    let rest = &style[start..];
    let end = rest.find("\")")?;
    (end > 0).then(|| rest[..end].to_string())
}

const MAX_DECODE_LAYERS: usize = 3;

/// Normalize an outbound link: unwrap the redirect shim's `u` parameter when
/// present, then peel the percent-encoding layers the site applies.
pub fn decode_share_url(raw: &str) -> String {
    let mut current = raw.to_string();
    if let Ok(parsed) = Url::parse(&current) {
        if let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "u") {
            current = target.into_owned();
        }
    }
    for _ in 0..MAX_DECODE_LAYERS {
        match urlencoding::decode(&current) {
            Ok(decoded) if decoded != current => current = decoded.into_owned(),
            _ => break,
        }
    }
    current
}
