//! Per-post extraction.
//!
//! Three extractors run in sequence against one post handle:
//!
//! - [`metadata`]: permalink, date and id from transient hover/tooltip state,
//!   recovered from UI races by a bounded, backed-off retry
//! - [`author`]: author name, profile URL, avatar and activity annotation
//! - [`content`]: text/HTML body, styled background, images and attachments;
//!   errors here propagate, there is no outer retry
//!
//! Extractors receive a single handle per invocation and hold no state
//! across calls.

pub mod author;
pub mod content;
pub mod metadata;

pub use author::{extract_author, PostAuthor};
pub use content::{extract_content, PostContent};
pub use metadata::{extract_metadata, PostMetadata};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry with exponential backoff for the metadata extraction.
///
/// The hover/tooltip dance is racy against animation and scroll state, so
/// each failed attempt restarts from the first step. The bound guarantees
/// termination against a permanently broken page; exhausting it surfaces
/// [`TrawlError::MetadataGaveUp`](crate::app::TrawlError::MetadataGaveUp).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts before giving up (default: 40)
    pub max_attempts: u32,

    /// Backoff after the first failed attempt in milliseconds (default: 150)
    pub initial_backoff_ms: u64,

    /// Backoff ceiling in milliseconds (default: 3000)
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 40,
            initial_backoff_ms: 150,
            max_backoff_ms: 3000,
        }
    }
}

impl RetryPolicy {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn next_backoff(&self, current: Duration) -> Duration {
        (current * 2).min(Duration::from_millis(self.max_backoff_ms))
    }

    /// A policy that never sleeps, for tests.
    #[cfg(test)]
    pub(crate) fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }
}
