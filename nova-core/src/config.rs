//! Configuration for a [`SaveManager`](crate::manager::SaveManager).

use crate::logbook::Author;
use std::path::PathBuf;

/// Default storage slot for the mounted logbook.
pub const DEFAULT_LOGBOOK_KEY: &str = "aquanova_logbook";

/// Default storage slot for the cached state tree.
pub const DEFAULT_STATE_CACHE_KEY: &str = "aquanova_gamestate";

/// Settings for storage, content locations and entry defaults.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory used by file-backed storage.
    pub storage_dir: PathBuf,

    /// Storage slot holding the mounted logbook.
    pub logbook_key: String,

    /// Storage slot holding the raw state cache.
    pub state_cache_key: String,

    /// Directory or `http(s)://` base URL for content documents.
    pub content_root: String,

    /// Campaign document fetched on first run.
    pub bootstrap_resource: String,

    /// Contact definitions document.
    pub contacts_resource: String,

    /// Author applied to entries that do not name one.
    pub default_author: Author,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagerConfig {
    /// Create a config with the stock keys and a `saves`/`data` layout.
    pub fn new() -> Self {
        Self {
            storage_dir: PathBuf::from("saves"),
            logbook_key: DEFAULT_LOGBOOK_KEY.to_string(),
            state_cache_key: DEFAULT_STATE_CACHE_KEY.to_string(),
            content_root: "data".to_string(),
            bootstrap_resource: "campaign.json".to_string(),
            contacts_resource: "contacts.json".to_string(),
            default_author: Author::default(),
        }
    }

    /// Load overrides from the environment.
    ///
    /// Recognised variables (all optional):
    /// - `NOVA_STORAGE_DIR` -- directory for save slots
    /// - `NOVA_CONTENT_ROOT` -- content directory or base URL
    /// - `NOVA_BOOTSTRAP` -- campaign document name
    /// - `NOVA_CONTACTS` -- contact definitions document name
    /// - `NOVA_AUTHOR` -- default author name
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(dir) = std::env::var("NOVA_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Ok(root) = std::env::var("NOVA_CONTENT_ROOT") {
            config.content_root = root;
        }
        if let Ok(resource) = std::env::var("NOVA_BOOTSTRAP") {
            config.bootstrap_resource = resource;
        }
        if let Ok(resource) = std::env::var("NOVA_CONTACTS") {
            config.contacts_resource = resource;
        }
        if let Ok(name) = std::env::var("NOVA_AUTHOR") {
            config.default_author.name = name;
        }
        config
    }

    /// Set the storage directory.
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// Set both storage slot keys.
    pub fn with_keys(
        mut self,
        logbook_key: impl Into<String>,
        state_cache_key: impl Into<String>,
    ) -> Self {
        self.logbook_key = logbook_key.into();
        self.state_cache_key = state_cache_key.into();
        self
    }

    /// Set the content root.
    pub fn with_content_root(mut self, root: impl Into<String>) -> Self {
        self.content_root = root.into();
        self
    }

    /// Set the bootstrap campaign document name.
    pub fn with_bootstrap_resource(mut self, resource: impl Into<String>) -> Self {
        self.bootstrap_resource = resource.into();
        self
    }

    /// Set the contact definitions document name.
    pub fn with_contacts_resource(mut self, resource: impl Into<String>) -> Self {
        self.contacts_resource = resource.into();
        self
    }

    /// Set the default entry author.
    pub fn with_default_author(mut self, author: Author) -> Self {
        self.default_author = author;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_config() {
        let config = ManagerConfig::new()
            .with_storage_dir("/tmp/nova")
            .with_keys("book", "cache")
            .with_content_root("http://localhost:8000/data")
            .with_bootstrap_resource("descent.json");

        assert_eq!(config.storage_dir, PathBuf::from("/tmp/nova"));
        assert_eq!(config.logbook_key, "book");
        assert_eq!(config.state_cache_key, "cache");
        assert_eq!(config.content_root, "http://localhost:8000/data");
        assert_eq!(config.bootstrap_resource, "descent.json");
        assert_eq!(config.contacts_resource, "contacts.json");
    }

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.logbook_key, DEFAULT_LOGBOOK_KEY);
        assert_eq!(config.state_cache_key, DEFAULT_STATE_CACHE_KEY);
    }
}
