//! Authored content documents.
//!
//! The bootstrap campaign and the contact definitions are plain JSON
//! documents fetched by name from a [`ContentSource`], either a local
//! directory or an HTTP base URL.

use crate::error::{LogbookError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs;

/// Where authored JSON documents come from.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch and parse the document named `resource`.
    async fn fetch_json(&self, resource: &str) -> Result<Value>;
}

/// Content read from a local directory.
#[derive(Debug, Clone)]
pub struct FileContent {
    root: PathBuf,
}

impl FileContent {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContentSource for FileContent {
    async fn fetch_json(&self, resource: &str) -> Result<Value> {
        let path = self.root.join(resource);
        let content = fs::read_to_string(&path).await.map_err(|e| {
            LogbookError::BootstrapFetchFailed(format!("{}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| LogbookError::BootstrapFetchFailed(format!("{}: {e}", path.display())))
    }
}

/// Content fetched over HTTP relative to a base URL.
#[derive(Debug, Clone)]
pub struct HttpContent {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContent {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Full URL for a resource name.
    pub fn url_for(&self, resource: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            resource.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ContentSource for HttpContent {
    async fn fetch_json(&self, resource: &str) -> Result<Value> {
        let url = self.url_for(resource);
        let fetch_failed =
            |e: reqwest::Error| LogbookError::BootstrapFetchFailed(format!("{url}: {e}"));

        self.client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_failed)?
            .json::<Value>()
            .await
            .map_err(fetch_failed)
    }
}

/// Pick a content source for `root`: HTTP(S) URLs fetch remotely, anything else is a directory.
pub fn content_source_for(root: &str) -> Box<dyn ContentSource> {
    if root.starts_with("http://") || root.starts_with("https://") {
        Box::new(HttpContent::new(root))
    } else {
        Box::new(FileContent::new(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_content_reads_json() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("contacts.json"), r#"{"crew": {}}"#).unwrap();

        let source = FileContent::new(temp_dir.path());
        let doc = source.fetch_json("contacts.json").await.unwrap();
        assert!(doc.get("crew").is_some());
    }

    #[tokio::test]
    async fn test_file_content_missing_or_malformed() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("bad.json"), "{").unwrap();
        let source = FileContent::new(temp_dir.path());

        let err = source.fetch_json("absent.json").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BootstrapFetchFailed);
        let err = source.fetch_json("bad.json").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BootstrapFetchFailed);
    }

    #[test]
    fn test_url_for() {
        let source = HttpContent::new("http://localhost:8000/data/");
        assert_eq!(
            source.url_for("/campaign.json"),
            "http://localhost:8000/data/campaign.json"
        );
    }
}
