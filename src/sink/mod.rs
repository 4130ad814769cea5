//! Record persistence sinks.
//!
//! The on-disk format is one JSON array per feed: each append reads the
//! array back in full, pushes the record and rewrites the file. That is
//! O(n) per record, which is fine at feed volumes and keeps the file
//! readable as a plain JSON document at all times.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::app::Result;
use crate::domain::Post;

pub trait RecordSink: Send + Sync {
    fn append(&self, post: &Post) -> Result<()>;
}

/// JSON-array file sink.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Create a sink at `path`, normalizing the extension to `.json`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let mut path: PathBuf = path.into();
        if path.extension().map(|ext| ext != "json").unwrap_or(true) {
            let mut name = path.file_name().map(OsString::from).unwrap_or_default();
            name.push(".json");
            path.set_file_name(name);
        }
        Self { path }
    }

    /// Sink with the derived default name for a feed: `<feed-id>.json`.
    pub fn for_feed(feed_id: &str) -> Self {
        Self::new(feed_id)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all persisted records; a missing file is an empty sink.
    pub fn read_all(&self) -> Result<Vec<Post>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl RecordSink for JsonFileSink {
    fn append(&self, post: &Post) -> Result<()> {
        let mut records = self.read_all()?;
        records.push(post.clone());
        std::fs::write(&self.path, serde_json::to_vec_pretty(&records)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post(id: &str) -> Post {
        Post {
            id: id.into(),
            permalink: format!("https://example.com/groups/g/posts/{id}"),
            date: "June 5, 2023 3:14 PM".into(),
            timestamp: Some(1685978040),
            author_name: "Ada".into(),
            author_url: Some("https://example.com/ada".into()),
            author_avatar: None,
            activity: None,
            content_text: Some(format!("post {id}")),
            content_html: Some(format!("<p>post {id}</p>")),
            background: None,
            images: vec![format!("https://cdn.example.com/{id}.jpg")],
            attachment_url: None,
            attachment_file: None,
        }
    }

    #[test]
    fn test_roundtrip_preserves_records_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("out.json"));

        let posts: Vec<Post> = (1..=5).map(|n| sample_post(&n.to_string())).collect();
        for post in &posts {
            sink.append(post).unwrap();
        }

        assert_eq!(sink.read_all().unwrap(), posts);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("nothing.json"));
        assert!(sink.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_extension_is_normalized() {
        assert_eq!(
            JsonFileSink::new("records").path(),
            Path::new("records.json")
        );
        assert_eq!(
            JsonFileSink::new("records.json").path(),
            Path::new("records.json")
        );
        assert_eq!(
            JsonFileSink::new("records.data").path(),
            Path::new("records.data.json")
        );
    }

    #[test]
    fn test_for_feed_derives_default_name() {
        assert_eq!(
            JsonFileSink::for_feed("123456789").path(),
            Path::new("123456789.json")
        );
    }

    #[test]
    fn test_file_stays_a_plain_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path().join("out.json"));
        sink.append(&sample_post("1")).unwrap();
        sink.append(&sample_post("2")).unwrap();

        let raw = std::fs::read_to_string(sink.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.is_array());
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[0]["authorName"], "Ada");
    }
}
