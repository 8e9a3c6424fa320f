//! Testing utilities for the persistence engine.
//!
//! This module provides tools for integration testing:
//! - `StaticContent` for content documents without disk or network
//! - `SlowStorage` and `FailingStorage` for exercising save edge cases
//! - `TestHarness` for scripted logbook scenarios
//! - Sample campaign and contact documents

use crate::content::ContentSource;
use crate::error::{LogbookError, Result};
use crate::logbook::{append, revert, Entry, EntryInput, Logbook};
use crate::persist::{MemoryStorage, Storage};
use crate::state::StateStore;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// A content source serving fixed documents.
///
/// Unknown resources fail with [`LogbookError::BootstrapFetchFailed`], the
/// same way an unreachable endpoint does.
#[derive(Debug, Clone, Default)]
pub struct StaticContent {
    documents: HashMap<String, Value>,
}

impl StaticContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `doc` for `resource`.
    pub fn with(mut self, resource: impl Into<String>, doc: Value) -> Self {
        self.documents.insert(resource.into(), doc);
        self
    }
}

#[async_trait]
impl ContentSource for StaticContent {
    async fn fetch_json(&self, resource: &str) -> Result<Value> {
        self.documents
            .get(resource)
            .cloned()
            .ok_or_else(|| LogbookError::BootstrapFetchFailed(format!("{resource}: not found")))
    }
}

/// Memory storage whose writes take a while to complete.
#[derive(Debug)]
pub struct SlowStorage {
    inner: MemoryStorage,
    delay: Duration,
}

impl Default for SlowStorage {
    fn default() -> Self {
        Self::new(Duration::from_millis(20))
    }
}

impl SlowStorage {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStorage::new(),
            delay,
        }
    }
}

#[async_trait]
impl Storage for SlowStorage {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.write(key, value).await
    }
}

/// Storage that is always empty and rejects every write, like a full quota.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStorage;

#[async_trait]
impl Storage for FailingStorage {
    async fn read(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn write(&self, key: &str, _value: &str) -> Result<()> {
        Err(LogbookError::Storage(format!("quota exceeded writing {key}")))
    }
}

/// Harness for scripted logbook scenarios without storage.
pub struct TestHarness {
    /// The live state.
    pub store: StateStore,
    /// The logbook under test.
    pub logbook: Logbook,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Create a harness with default state and an empty logbook.
    pub fn new() -> Self {
        Self {
            store: StateStore::new(),
            logbook: Logbook::new("Test Logbook"),
        }
    }

    /// Write a value into the live state.
    pub fn set(&mut self, path: &str, value: Value) -> &mut Self {
        self.store.set(path, value);
        self
    }

    /// Append an entry with the given content.
    pub fn log(&mut self, content: &str) -> Result<Entry> {
        append(&mut self.logbook, &self.store, EntryInput::new(content))
    }

    /// Revert to an entry.
    pub fn revert(&mut self, entry_id: &str) -> Result<()> {
        revert(&mut self.logbook, &mut self.store, entry_id)
    }

    /// Ids of the current entries, in order.
    pub fn entry_ids(&self) -> Vec<String> {
        self.logbook.entries.iter().map(|e| e.id.clone()).collect()
    }
}

/// A two-entry campaign document in the external authored format.
pub fn sample_campaign() -> Value {
    json!({
        "Metadata": {
            "campaignTitle": "Aqua Nova: Descent",
            "logbookId": "aquanova-descent",
            "createdAt": "2024-03-01T08:00:00Z",
            "lastPlayed": "2024-03-02T21:15:00Z"
        },
        "entries": [
            {
                "logbook": {
                    "id": "LOG-0001",
                    "timestamp": "2024-03-01T08:00:00Z",
                    "type": "mission",
                    "tags": ["briefing"],
                    "content": "Pre-dive checks complete. Ballast nominal.",
                    "tasks": ["Run sonar calibration"]
                },
                "navigation": { "depth": 0.0, "heading": 90.0 },
                "mission": { "title": "Trench Survey", "phase": "predive", "objectives": ["Reach 150m"] }
            },
            {
                "logbook": {
                    "id": "LOG-0002",
                    "timestamp": "2024-03-01T09:30:00Z",
                    "content": "Holding at 150m. Thermocline detected.",
                    "completedTasks": ["Run sonar calibration"]
                },
                "navigation": { "depth": 150.0, "heading": 112.0 },
                "environment": { "waterTemperature": 6.5 },
                "contacts": { "crew": {}, "external": {} }
            }
        ]
    })
}

/// A contact definitions document with one crew member and one external contact.
pub fn sample_contacts() -> Value {
    json!({
        "crew": {
            "chief": {
                "name": "Mara Okafor",
                "role": "Chief Engineer",
                "bio": "Twenty years keeping submersibles alive.",
                "image": "portraits/okafor.png",
                "dialogueOptions": { "greeting": "Reactor's purring." }
            }
        },
        "contacts": {
            "topside": {
                "name": "Topside Control",
                "role": "Surface Support Vessel",
                "bio": "The support ship holding station above the dive site.",
                "known": true
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_scenario() {
        let mut harness = TestHarness::new();
        harness.set("navigation.depth", json!(10.0));
        harness.log("one").unwrap();
        harness.set("navigation.depth", json!(20.0));
        harness.log("two").unwrap();
        harness.log("three").unwrap();

        harness.revert("LOG-0001").unwrap();
        assert_eq!(harness.entry_ids(), vec!["LOG-0001"]);
        assert_eq!(harness.store.get("navigation.depth"), Some(&json!(10.0)));
    }

    #[tokio::test]
    async fn test_static_content() {
        let content = StaticContent::new().with("campaign.json", sample_campaign());
        assert!(content.fetch_json("campaign.json").await.is_ok());
        assert!(content.fetch_json("contacts.json").await.is_err());
    }

    #[tokio::test]
    async fn test_failing_storage() {
        assert!(FailingStorage.write("k", "v").await.is_err());
        assert_eq!(FailingStorage.read("k").await.unwrap(), None);
    }
}
