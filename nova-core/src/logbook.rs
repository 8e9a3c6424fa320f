//! Logbooks and their entry log.
//!
//! A [`Logbook`] is one save container: an append-only, chronological list
//! of [`Entry`] records, each pairing authored narrative content with a
//! full state [`Snapshot`]. Reverting collapses history to a chosen entry.

use crate::error::{LogbookError, Result};
use crate::state::{Snapshot, Stateful};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Current logbook schema version, stamped on every write.
pub const SCHEMA_VERSION: &str = "2.0";

/// Prefix shared by every entry id.
const ENTRY_ID_PREFIX: &str = "LOG-";

/// Who wrote an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub organization: String,
    pub department: String,
    pub name: String,
    pub role: String,
}

impl Default for Author {
    fn default() -> Self {
        Self {
            organization: "Aqua Nova Expedition".to_string(),
            department: "Command".to_string(),
            name: "Captain".to_string(),
            role: "Commanding Officer".to_string(),
        }
    }
}

/// Bookkeeping attached to an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntryMetadata {
    pub importance: String,
    pub tags: Vec<String>,
    pub can_revert: bool,
}

impl Default for EntryMetadata {
    fn default() -> Self {
        Self {
            importance: "normal".to_string(),
            tags: Vec::new(),
            can_revert: true,
        }
    }
}

/// One narrative log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub tags: Vec<String>,
    pub author: Author,
    pub content: String,
    pub tasks: Vec<String>,
    pub completed_tasks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_snapshot: Option<Snapshot>,
    pub metadata: EntryMetadata,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            id: String::new(),
            timestamp: String::new(),
            entry_type: "log".to_string(),
            tags: Vec::new(),
            author: Author::default(),
            content: String::new(),
            tasks: Vec::new(),
            completed_tasks: Vec::new(),
            game_snapshot: None,
            metadata: EntryMetadata::default(),
        }
    }
}

/// Caller-supplied fields for a new entry. Anything left `None` is defaulted.
#[derive(Debug, Clone, Default)]
pub struct EntryInput {
    pub content: String,
    pub entry_type: Option<String>,
    pub tags: Vec<String>,
    pub author: Option<Author>,
    pub tasks: Vec<String>,
    pub completed_tasks: Vec<String>,
    pub importance: Option<String>,
    pub can_revert: Option<bool>,
}

impl EntryInput {
    /// Create input with the given narrative content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Set the entry type (defaults to `log`).
    pub fn with_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = Some(entry_type.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: Author) -> Self {
        self.author = Some(author);
        self
    }

    /// Add an open task.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.tasks.push(task.into());
        self
    }

    /// Add a completed task.
    pub fn with_completed_task(mut self, task: impl Into<String>) -> Self {
        self.completed_tasks.push(task.into());
        self
    }

    /// Set the importance (defaults to `normal`).
    pub fn with_importance(mut self, importance: impl Into<String>) -> Self {
        self.importance = Some(importance.into());
        self
    }

    /// Mark whether the entry may be reverted to (defaults to `true`).
    pub fn revertible(mut self, can_revert: bool) -> Self {
        self.can_revert = Some(can_revert);
        self
    }
}

/// Derived counters kept in step with a logbook's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Statistics {
    pub total_entries: usize,
    pub first_entry: Option<String>,
    pub last_entry: Option<String>,
}

/// A save container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Logbook {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created: String,
    pub last_modified: String,
    pub schema_version: String,
    pub mounted: bool,
    pub entries: Vec<Entry>,
    pub statistics: Statistics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exported: Option<String>,
}

impl Default for Logbook {
    fn default() -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            created: now.clone(),
            last_modified: now,
            schema_version: SCHEMA_VERSION.to_string(),
            mounted: false,
            entries: Vec::new(),
            statistics: Statistics::default(),
            exported: None,
        }
    }
}

impl Logbook {
    /// Create an empty, unmounted logbook.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: slug(&name),
            name,
            ..Self::default()
        }
    }

    /// Find an entry by id.
    pub fn entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// The most recent entry.
    pub fn latest_entry(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// The snapshot of the most recent entry, if it has one.
    ///
    /// Earlier entries are not searched: a snapshotless last entry means
    /// there is nothing to restore.
    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.latest_entry().and_then(|e| e.game_snapshot.as_ref())
    }

    /// Entries carrying `tag`, in chronological order.
    pub fn entries_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.tags.iter().any(|t| t == tag))
    }

    /// Recompute statistics from the current entries.
    pub fn refresh_statistics(&mut self) {
        self.statistics = Statistics {
            total_entries: self.entries.len(),
            first_entry: self.entries.first().map(|e| e.timestamp.clone()),
            last_entry: self.entries.last().map(|e| e.timestamp.clone()),
        };
    }

    fn touch(&mut self) {
        self.last_modified = Utc::now().to_rfc3339();
    }
}

fn slug(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "logbook".to_string()
    } else {
        slug.to_string()
    }
}

/// The digits of an id such as `LOG-0042`, without leading zeros.
fn sequence_of(id: &str) -> Option<&str> {
    let start = id.find(ENTRY_ID_PREFIX)? + ENTRY_ID_PREFIX.len();
    let rest = &id[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..end];
    if digits.is_empty() {
        return None;
    }
    Some(digits.trim_start_matches('0'))
}

/// Add one to a decimal digit string. The empty string counts as zero.
fn increment(digits: &str) -> String {
    let mut out: Vec<char> = digits.chars().collect();
    for i in (0..out.len()).rev() {
        if out[i] == '9' {
            out[i] = '0';
        } else {
            out[i] = char::from(out[i] as u8 + 1);
            return out.into_iter().collect();
        }
    }
    std::iter::once('1').chain(out).collect()
}

/// Allocate the next entry id for `logbook`.
///
/// Ids not in `LOG-<digits>` form are ignored. The first id is `LOG-0001`.
/// Sequences compare as arbitrary-length decimals, so there is no overflow.
pub fn next_id(logbook: &Logbook) -> String {
    let max = logbook
        .entries
        .iter()
        .filter_map(|e| sequence_of(&e.id))
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .unwrap_or("");
    format!("{ENTRY_ID_PREFIX}{:0>4}", increment(max))
}

/// Build an entry from `input`, embed a fresh snapshot from `state`, and append it.
///
/// Statistics and `last_modified` are updated. Persisting is left to the caller.
pub fn append(logbook: &mut Logbook, state: &impl Stateful, input: EntryInput) -> Result<Entry> {
    let snapshot = state.snapshot()?;

    let entry = Entry {
        id: next_id(logbook),
        timestamp: Utc::now().to_rfc3339(),
        entry_type: input.entry_type.unwrap_or_else(|| "log".to_string()),
        tags: input.tags.clone(),
        author: input.author.unwrap_or_default(),
        content: input.content,
        tasks: input.tasks,
        completed_tasks: input.completed_tasks,
        game_snapshot: Some(snapshot),
        metadata: EntryMetadata {
            importance: input.importance.unwrap_or_else(|| "normal".to_string()),
            tags: input.tags,
            can_revert: input.can_revert.unwrap_or(true),
        },
    };

    logbook.entries.push(entry.clone());
    logbook.refresh_statistics();
    logbook.touch();

    Ok(entry)
}

/// Restore `state` from the entry `entry_id` and discard every later entry.
///
/// This is a destructive rewind: entries after the target are gone for good.
/// Nothing is truncated if the restore itself fails.
pub fn revert(logbook: &mut Logbook, state: &mut impl Stateful, entry_id: &str) -> Result<()> {
    let position = logbook
        .entries
        .iter()
        .position(|e| e.id == entry_id)
        .ok_or_else(|| LogbookError::EntryNotFound(entry_id.to_string()))?;

    let target = &logbook.entries[position];
    let snapshot = target
        .game_snapshot
        .as_ref()
        .ok_or_else(|| LogbookError::NoSnapshot(entry_id.to_string()))?;
    if !target.metadata.can_revert {
        return Err(LogbookError::NonRevertible(entry_id.to_string()));
    }

    state.restore(snapshot)?;

    let discarded = logbook.entries.len() - (position + 1);
    logbook.entries.truncate(position + 1);
    logbook.refresh_statistics();
    logbook.touch();

    info!(entry = entry_id, discarded, "reverted logbook");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::state::StateStore;
    use serde_json::json;

    fn entry_with_id(id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            ..Entry::default()
        }
    }

    #[test]
    fn test_next_id_empty() {
        assert_eq!(next_id(&Logbook::new("Empty")), "LOG-0001");
    }

    #[test]
    fn test_next_id_uses_max_and_ignores_foreign_ids() {
        let mut logbook = Logbook::new("Mixed");
        logbook.entries = vec![
            entry_with_id("LOG-0003"),
            entry_with_id("custom-entry"),
            entry_with_id("LOG-0011"),
            entry_with_id("LOG-0002"),
        ];
        assert_eq!(next_id(&logbook), "LOG-0012");
    }

    #[test]
    fn test_next_id_beyond_four_digits() {
        let mut logbook = Logbook::new("Long");
        logbook.entries = vec![entry_with_id("LOG-9999")];
        assert_eq!(next_id(&logbook), "LOG-10000");
    }

    #[test]
    fn test_next_id_past_u32_range() {
        let mut logbook = Logbook::new("Huge");
        logbook.entries = vec![entry_with_id("LOG-0007"), entry_with_id("LOG-4294967295")];
        assert_eq!(next_id(&logbook), "LOG-4294967296");

        logbook.entries.push(entry_with_id("LOG-99999999999999999999999"));
        assert_eq!(next_id(&logbook), "LOG-100000000000000000000000");
    }

    #[test]
    fn test_next_id_ignores_leading_zeros() {
        let mut logbook = Logbook::new("Padded");
        logbook.entries = vec![entry_with_id("LOG-000000950"), entry_with_id("LOG-0012")];
        assert_eq!(next_id(&logbook), "LOG-0951");

        logbook.entries = vec![entry_with_id("LOG-0000")];
        assert_eq!(next_id(&logbook), "LOG-0001");
    }

    #[test]
    fn test_latest_snapshot_is_last_entry_only() {
        let store = StateStore::new();
        let mut logbook = Logbook::new("Gaps");
        append(&mut logbook, &store, EntryInput::new("with state")).unwrap();
        assert!(logbook.latest_snapshot().is_some());

        logbook.entries.push(entry_with_id("LOG-0002"));
        assert!(logbook.latest_snapshot().is_none());
    }

    #[test]
    fn test_append_first_entry() {
        let store = StateStore::new();
        let mut logbook = Logbook::new("Fresh");

        let entry = append(&mut logbook, &store, EntryInput::new("test")).unwrap();

        assert_eq!(entry.id, "LOG-0001");
        assert_eq!(entry.content, "test");
        assert_eq!(entry.entry_type, "log");
        assert_eq!(entry.author, Author::default());
        assert!(entry.metadata.can_revert);
        assert_eq!(entry.metadata.importance, "normal");
        assert!(entry.game_snapshot.is_some());
        assert_eq!(logbook.statistics.total_entries, 1);
        assert_eq!(logbook.statistics.first_entry.as_deref(), Some(entry.timestamp.as_str()));
    }

    #[test]
    fn test_append_copies_tags_into_metadata() {
        let store = StateStore::new();
        let mut logbook = Logbook::new("Tags");
        let entry = append(
            &mut logbook,
            &store,
            EntryInput::new("sonar ping")
                .with_tag("sonar")
                .with_importance("high")
                .with_type("event"),
        )
        .unwrap();

        assert_eq!(entry.metadata.tags, vec!["sonar".to_string()]);
        assert_eq!(entry.entry_type, "event");
        assert_eq!(logbook.entries_tagged("sonar").count(), 1);
        assert_eq!(logbook.entries_tagged("hull").count(), 0);
    }

    #[test]
    fn test_revert_truncates_and_restores() {
        let mut store = StateStore::new();
        let mut logbook = Logbook::new("Dive");

        for depth in [100.0, 200.0, 300.0, 400.0] {
            store.set("navigation.depth", json!(depth));
            append(&mut logbook, &store, EntryInput::new(format!("at {depth}"))).unwrap();
        }

        revert(&mut logbook, &mut store, "LOG-0002").unwrap();

        let ids: Vec<_> = logbook.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["LOG-0001", "LOG-0002"]);
        assert_eq!(logbook.statistics.total_entries, 2);
        assert_eq!(
            logbook.statistics.last_entry.as_deref(),
            Some(logbook.entries[1].timestamp.as_str())
        );
        assert_eq!(store.get("navigation.depth"), Some(&json!(200.0)));

        // Discarded ids are reallocated, not skipped.
        assert_eq!(next_id(&logbook), "LOG-0003");
    }

    #[test]
    fn test_revert_errors() {
        let mut store = StateStore::new();
        let mut logbook = Logbook::new("Errors");
        append(&mut logbook, &store, EntryInput::new("locked").revertible(false)).unwrap();
        logbook.entries.push(entry_with_id("LOG-0002"));

        let err = revert(&mut logbook, &mut store, "LOG-0099").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryNotFound);

        let err = revert(&mut logbook, &mut store, "LOG-0002").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoSnapshot);

        let err = revert(&mut logbook, &mut store, "LOG-0001").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonRevertible);

        // Failed reverts leave history intact.
        assert_eq!(logbook.entries.len(), 2);
    }

    #[test]
    fn test_partial_document_deserializes_with_defaults() {
        let logbook: Logbook = serde_json::from_value(json!({
            "name": "Sparse",
            "entries": [{"id": "LOG-0001", "timestamp": "t", "content": "hi"}]
        }))
        .unwrap();

        assert_eq!(logbook.entries[0].entry_type, "log");
        assert!(logbook.entries[0].metadata.can_revert);
        assert!(!logbook.mounted);
        assert_eq!(logbook.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_slug() {
        assert_eq!(Logbook::new("Aqua Nova: Dive 1").id, "aqua-nova--dive-1");
        assert_eq!(Logbook::new("!!!").id, "logbook");
    }
}
