//! External campaign documents.
//!
//! Campaign documents are the authored bootstrap format: a `Metadata` block
//! plus a list of entries whose narrative fields live under `logbook` and
//! whose state sections sit alongside it. [`convert_campaign`] maps them into
//! the internal [`Logbook`] shape; [`validate`] is the structural gate applied
//! to anything read from outside.

use crate::error::{LogbookError, Result};
use crate::logbook::{
    next_id, Author, Entry, EntryMetadata, Logbook, Statistics, SCHEMA_VERSION,
};
use crate::state::{Snapshot, SNAPSHOT_FIELDS};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};

/// The `Metadata` block of a campaign document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CampaignMetadata {
    pub campaign_title: Option<String>,
    pub logbook_id: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
    pub last_played: Option<String>,
}

/// Narrative half of a campaign entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CampaignLog {
    id: Option<String>,
    timestamp: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    tags: Vec<String>,
    author: Option<Author>,
    content: String,
    tasks: Vec<String>,
    completed_tasks: Vec<String>,
    importance: Option<String>,
    can_revert: Option<bool>,
}

/// Whether `doc` looks like a campaign document rather than an internal logbook.
pub fn is_campaign(doc: &Value) -> bool {
    doc.get("Metadata").is_some()
}

/// Convert an external campaign document into a logbook.
///
/// Missing collections default to empty; statistics are derived from the
/// converted entries when the document does not carry them. Only a non-object
/// document is rejected.
pub fn convert_campaign(doc: &Value) -> Result<Logbook> {
    let Value::Object(root) = doc else {
        return Err(LogbookError::InvalidStructure(
            "campaign document must be an object".to_string(),
        ));
    };

    let metadata: CampaignMetadata = root
        .get("Metadata")
        .and_then(|m| serde_json::from_value(m.clone()).ok())
        .unwrap_or_default();

    let now = Utc::now().to_rfc3339();
    let name = metadata
        .campaign_title
        .clone()
        .or_else(|| metadata.logbook_id.clone())
        .unwrap_or_else(|| "Imported Campaign".to_string());

    let entries: Vec<Entry> = root
        .get("entries")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| convert_entry(item, &now))
                .collect()
        })
        .unwrap_or_default();

    let mut logbook = Logbook::new(name);
    if let Some(id) = metadata.logbook_id {
        logbook.id = id;
    }
    logbook.description = metadata.description.unwrap_or_default();
    logbook.created = metadata.created_at.unwrap_or_else(|| now.clone());
    logbook.last_modified = metadata.last_played.unwrap_or(now);
    logbook.schema_version = SCHEMA_VERSION.to_string();
    logbook.entries = entries;

    // Unnumbered entries are allocated after every authored id.
    for i in 0..logbook.entries.len() {
        if logbook.entries[i].id.is_empty() {
            let id = next_id(&logbook);
            logbook.entries[i].id = id;
        }
    }
    logbook.refresh_statistics();

    if let Some(stats) = root
        .get("statistics")
        .and_then(|s| serde_json::from_value::<Statistics>(s.clone()).ok())
    {
        // Authored first/last markers are kept; the count always follows the entries.
        logbook.statistics.first_entry = stats.first_entry.or(logbook.statistics.first_entry);
        logbook.statistics.last_entry = stats.last_entry.or(logbook.statistics.last_entry);
    }

    Ok(logbook)
}

fn convert_entry(item: &Value, now: &str) -> Entry {
    let log: CampaignLog = item
        .get("logbook")
        .and_then(|l| serde_json::from_value(l.clone()).ok())
        .unwrap_or_default();

    let timestamp = log.timestamp.unwrap_or_else(|| now.to_string());

    let fields: Map<String, Value> = SNAPSHOT_FIELDS
        .iter()
        .filter_map(|key| item.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect();
    let game_snapshot = (!fields.is_empty()).then(|| Snapshot {
        timestamp: timestamp.clone(),
        fields,
    });

    Entry {
        id: log.id.unwrap_or_default(),
        timestamp,
        entry_type: log.entry_type.unwrap_or_else(|| "log".to_string()),
        tags: log.tags.clone(),
        author: log.author.unwrap_or_default(),
        content: log.content,
        tasks: log.tasks,
        completed_tasks: log.completed_tasks,
        game_snapshot,
        metadata: EntryMetadata {
            importance: log.importance.unwrap_or_else(|| "normal".to_string()),
            tags: log.tags,
            can_revert: log.can_revert.unwrap_or(true),
        },
    }
}

/// Structural gate for externally supplied logbook documents.
///
/// Requires a `name`. When `entries` is present it must be an array whose
/// elements each carry an id and timestamp, either at the top level or under
/// `logbook`. Missing `statistics` is synthesized from the entry count.
pub fn validate(doc: &mut Value) -> bool {
    let Value::Object(root) = doc else {
        return false;
    };
    if !root.get("name").is_some_and(|n| n.is_string()) {
        return false;
    }

    let entry_count = match root.get("entries") {
        None => 0,
        Some(Value::Array(items)) => {
            if !items.iter().all(has_id_and_timestamp) {
                return false;
            }
            items.len()
        }
        Some(_) => return false,
    };

    if !root.contains_key("statistics") {
        root.insert(
            "statistics".to_string(),
            serde_json::json!({ "totalEntries": entry_count }),
        );
    }
    true
}

fn has_id_and_timestamp(entry: &Value) -> bool {
    let has = |node: &Value| node.get("id").is_some() && node.get("timestamp").is_some();
    has(entry) || entry.get("logbook").is_some_and(has)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_campaign;
    use serde_json::json;

    #[test]
    fn test_convert_sample_campaign() {
        let logbook = convert_campaign(&sample_campaign()).unwrap();

        assert_eq!(logbook.name, "Aqua Nova: Descent");
        assert_eq!(logbook.id, "aquanova-descent");
        assert_eq!(logbook.entries.len(), 2);
        assert_eq!(logbook.statistics.total_entries, 2);
        assert!(!logbook.mounted);

        let first = &logbook.entries[0];
        assert_eq!(first.id, "LOG-0001");
        let snapshot = first.game_snapshot.as_ref().unwrap();
        assert_eq!(snapshot.get("navigation.depth"), Some(&json!(0.0)));
        assert!(snapshot.fields.get("logbook").is_none());
    }

    #[test]
    fn test_convert_minimal_document() {
        let logbook = convert_campaign(&json!({"Metadata": {}})).unwrap();
        assert_eq!(logbook.name, "Imported Campaign");
        assert!(logbook.entries.is_empty());
        assert_eq!(logbook.statistics.total_entries, 0);

        let mut as_value = serde_json::to_value(&logbook).unwrap();
        assert!(validate(&mut as_value));
    }

    #[test]
    fn test_convert_entry_without_ids_or_state() {
        let logbook = convert_campaign(&json!({
            "Metadata": {"logbookId": "bare"},
            "entries": [{"logbook": {"content": "no id"}}, {}]
        }))
        .unwrap();

        assert_eq!(logbook.name, "bare");
        assert_eq!(logbook.entries[0].id, "LOG-0001");
        assert_eq!(logbook.entries[1].id, "LOG-0002");
        assert!(logbook.entries[0].game_snapshot.is_none());
    }

    #[test]
    fn test_convert_mixed_authored_and_missing_ids() {
        let logbook = convert_campaign(&json!({
            "entries": [
                {"logbook": {"timestamp": "t0"}},
                {"logbook": {"id": "LOG-0002", "timestamp": "t1"}},
                {"logbook": {"timestamp": "t2"}},
                {"logbook": {"id": "LOG-0001", "timestamp": "t3"}}
            ]
        }))
        .unwrap();

        let ids: Vec<&str> = logbook.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["LOG-0003", "LOG-0002", "LOG-0004", "LOG-0001"]);
        assert_eq!(next_id(&logbook), "LOG-0005");
    }

    #[test]
    fn test_convert_rejects_non_object() {
        assert!(convert_campaign(&json!([])).is_err());
    }

    #[test]
    fn test_statistics_count_follows_entries() {
        let logbook = convert_campaign(&json!({
            "Metadata": {"campaignTitle": "Lying Stats"},
            "entries": [{"logbook": {"id": "LOG-0001", "timestamp": "t1"}}],
            "statistics": {"totalEntries": 40, "firstEntry": "t0"}
        }))
        .unwrap();

        assert_eq!(logbook.statistics.total_entries, 1);
        assert_eq!(logbook.statistics.first_entry.as_deref(), Some("t0"));
        assert_eq!(logbook.statistics.last_entry.as_deref(), Some("t1"));
    }

    #[test]
    fn test_validate() {
        assert!(!validate(&mut json!({"entries": []})));
        assert!(!validate(&mut json!({"name": "x", "entries": {}})));
        assert!(!validate(&mut json!({"name": "x", "entries": [{"id": "LOG-0001"}]})));
        assert!(validate(&mut json!({
            "name": "x",
            "entries": [{"logbook": {"id": "LOG-0001", "timestamp": "t"}}]
        })));
        assert!(!validate(&mut json!("x")));
    }

    #[test]
    fn test_validate_synthesizes_statistics() {
        let mut doc = json!({
            "name": "No Stats",
            "entries": [{"id": "LOG-0001", "timestamp": "t"}]
        });
        assert!(validate(&mut doc));
        assert_eq!(doc["statistics"]["totalEntries"], json!(1));
    }
}
