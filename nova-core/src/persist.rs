//! Durable storage for logbooks.
//!
//! Storage is a set of string slots addressed by key, modelled on browser
//! local storage. One slot holds the mounted logbook; a second holds a raw
//! copy of the state tree as a fast-path cache. The portable file format is
//! handled here too: [`export_file`] and [`parse_import`].

use crate::campaign::{convert_campaign, is_campaign, validate};
use crate::error::{LogbookError, Result};
use crate::logbook::{Logbook, SCHEMA_VERSION};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tracing::{debug, warn};

/// Key-addressed durable storage.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a slot. `Ok(None)` means the slot is empty.
    async fn read(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite a slot.
    async fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// Storage backed by one JSON file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the file backing `key`.
    pub fn slot_path(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{sanitized}.json"))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.slot_path(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.slot_path(key), value).await?;
        Ok(())
    }
}

/// In-memory storage, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a slot.
    pub fn with_slot(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(key.into(), value.into());
        }
        self
    }

    /// Current contents of a slot.
    pub fn slot(&self, key: &str) -> Option<String> {
        self.slots.lock().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slot(key))
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| LogbookError::Storage("memory storage lock poisoned".to_string()))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Writes logbooks and the state cache to their storage slots.
///
/// At most one save runs at a time; a save requested while another is in
/// flight fails with [`LogbookError::SaveInProgress`] instead of queuing.
pub struct Persistor {
    storage: Box<dyn Storage>,
    logbook_key: String,
    state_cache_key: String,
    saving: Cell<bool>,
}

struct SaveGuard<'a>(&'a Cell<bool>);

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Persistor {
    pub fn new(
        storage: Box<dyn Storage>,
        logbook_key: impl Into<String>,
        state_cache_key: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            logbook_key: logbook_key.into(),
            state_cache_key: state_cache_key.into(),
            saving: Cell::new(false),
        }
    }

    /// Whether a save is currently in flight.
    pub fn is_saving(&self) -> bool {
        self.saving.get()
    }

    /// Write `logbook` to the logbook slot and `state` to the cache slot.
    ///
    /// The written document is stamped with the current schema version and
    /// modification time; the in-memory logbook is left as is.
    pub async fn save(&self, logbook: &Logbook, state: Option<&Value>) -> Result<()> {
        if self.saving.replace(true) {
            return Err(LogbookError::SaveInProgress);
        }
        let _guard = SaveGuard(&self.saving);

        let mut doc = serde_json::to_value(logbook)?;
        if let Value::Object(map) = &mut doc {
            map.insert("schemaVersion".to_string(), json!(SCHEMA_VERSION));
            map.insert("lastModified".to_string(), json!(Utc::now().to_rfc3339()));
        }
        let content = serde_json::to_string(&doc)?;
        self.storage.write(&self.logbook_key, &content).await?;

        if let Some(state) = state {
            let cached = serde_json::to_string(state)?;
            self.storage.write(&self.state_cache_key, &cached).await?;
        }

        debug!(name = %logbook.name, entries = logbook.entries.len(), "persisted logbook");
        Ok(())
    }

    /// Read the logbook slot.
    ///
    /// A schema version mismatch is logged and the document is loaded anyway.
    pub async fn load(&self) -> Result<Option<Logbook>> {
        let Some(content) = self.storage.read(&self.logbook_key).await? else {
            return Ok(None);
        };

        let mut doc: Value = serde_json::from_str(&content)?;
        if !validate(&mut doc) {
            return Err(LogbookError::InvalidStructure(
                "stored logbook failed validation".to_string(),
            ));
        }

        let found = doc
            .get("schemaVersion")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        if found != SCHEMA_VERSION {
            warn!(expected = SCHEMA_VERSION, found = %found, "stored logbook schema version differs");
        }

        Ok(Some(serde_json::from_value(doc)?))
    }

    /// Read the cached state tree, if any. Unparseable caches are ignored.
    pub async fn load_state_cache(&self) -> Result<Option<Value>> {
        let Some(content) = self.storage.read(&self.state_cache_key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(value) if value.is_object() => Ok(Some(value)),
            _ => {
                warn!("ignoring unreadable state cache");
                Ok(None)
            }
        }
    }
}

/// Serialize a logbook to the portable file format.
///
/// The `mounted` flag is dropped and `exported`/`schemaVersion` stamped.
/// Keys are emitted in sorted order so exports diff cleanly.
pub fn export_file(logbook: &Logbook) -> Result<String> {
    let mut doc = serde_json::to_value(logbook)?;
    if let Value::Object(map) = &mut doc {
        map.remove("mounted");
        map.insert("exported".to_string(), json!(Utc::now().to_rfc3339()));
        map.insert("schemaVersion".to_string(), json!(SCHEMA_VERSION));
    }
    Ok(serde_json::to_string_pretty(&sort_keys(doc))?)
}

/// Rebuild every object in `value` with its keys in sorted order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> = map.into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(fields.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Parse a portable file into an unmounted logbook.
///
/// Campaign documents are converted. Anything failing [`validate`] is
/// rejected with [`LogbookError::InvalidStructure`].
pub fn parse_import(content: &str) -> Result<Logbook> {
    let mut doc: Value = serde_json::from_str(content)
        .map_err(|e| LogbookError::InvalidStructure(format!("not valid JSON: {e}")))?;

    let mut logbook = if is_campaign(&doc) {
        convert_campaign(&doc)?
    } else {
        if !validate(&mut doc) {
            return Err(LogbookError::InvalidStructure(
                "logbook document is missing required fields".to_string(),
            ));
        }
        serde_json::from_value::<Logbook>(doc)
            .map_err(|e| LogbookError::InvalidStructure(e.to_string()))?
    };

    logbook.mounted = false;
    logbook.refresh_statistics();
    Ok(logbook)
}

/// File name for an exported logbook, e.g. `Deep_Dive_logbook.json`.
pub fn export_file_name(logbook: &Logbook) -> String {
    let sanitized = logbook
        .name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    format!("{sanitized}_logbook.json")
}

/// Write an export of `logbook` into `dir`, returning the file path.
pub async fn export_to_dir(logbook: &Logbook, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let path = dir.as_ref().join(export_file_name(logbook));
    fs::write(&path, export_file(logbook)?).await?;
    Ok(path)
}
