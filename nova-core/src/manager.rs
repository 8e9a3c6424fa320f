//! SaveManager - the primary public API for logbook persistence.
//!
//! This module ties the pieces together. A [`SaveManager`] owns the
//! [`StateStore`], the [`Bookshelf`], durable storage and the content
//! source, and is constructed explicitly by the application root. Every
//! mutating logbook operation persists the mounted logbook afterwards.

use crate::bookshelf::Bookshelf;
use crate::campaign::convert_campaign;
use crate::config::ManagerConfig;
use crate::contacts::{reconcile, ContactDefinitions};
use crate::content::{content_source_for, ContentSource};
use crate::error::{LogbookError, Result};
use crate::logbook::{self, Entry, EntryInput, Logbook};
use crate::persist::{export_file, parse_import, FileStorage, Persistor, Storage};
use crate::state::StateStore;
use tracing::{debug, info, warn};

/// How [`SaveManager::initialize`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// A logbook was found in durable storage and mounted.
    Loaded { name: String },
    /// No saved logbook existed; the bootstrap campaign was converted and mounted.
    Bootstrapped { name: String },
    /// Nothing could be mounted; the user must import a logbook.
    RequiresImport { reason: String },
}

/// Result of the most recent automatic save.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    /// Nothing has been saved yet.
    #[default]
    Never,
    /// The mounted logbook was written.
    Saved,
    /// Another save was in flight, or nothing was mounted.
    Skipped,
    /// The write failed; in-memory state is still authoritative.
    Failed(String),
}

/// Owner of the live state and every known logbook.
pub struct SaveManager {
    config: ManagerConfig,
    store: StateStore,
    bookshelf: Bookshelf,
    persistor: Persistor,
    content: Box<dyn ContentSource>,
    init_failed: bool,
    last_save: SaveStatus,
}

impl SaveManager {
    /// Create a manager over explicit storage and content backends.
    pub fn new(
        config: ManagerConfig,
        storage: Box<dyn Storage>,
        content: Box<dyn ContentSource>,
    ) -> Self {
        let persistor = Persistor::new(
            storage,
            config.logbook_key.clone(),
            config.state_cache_key.clone(),
        );
        Self {
            config,
            store: StateStore::new(),
            bookshelf: Bookshelf::new(),
            persistor,
            content,
            init_failed: false,
            last_save: SaveStatus::Never,
        }
    }

    /// Create a manager with file storage and the content source named by `config`.
    pub fn from_config(config: ManagerConfig) -> Self {
        let storage = Box::new(FileStorage::new(config.storage_dir.clone()));
        let content = content_source_for(&config.content_root);
        Self::new(config, storage, content)
    }

    /// Bring the manager into a definite state.
    ///
    /// Loads the saved logbook if there is one, otherwise converts and mounts
    /// the bootstrap campaign. Any failure ends in
    /// [`InitOutcome::RequiresImport`] rather than an error.
    pub async fn initialize(&mut self) -> InitOutcome {
        match self.try_initialize().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "initialization failed; a logbook must be imported");
                self.init_failed = true;
                InitOutcome::RequiresImport {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_initialize(&mut self) -> Result<InitOutcome> {
        debug!("trying local logbook load");
        if let Some(logbook) = self.persistor.load().await? {
            let name = logbook.name.clone();
            let has_snapshot = logbook.latest_snapshot().is_some();
            let index = self.bookshelf.push(logbook);
            self.bookshelf.mount(index, &mut self.store)?;

            if !has_snapshot {
                if let Some(cached) = self.persistor.load_state_cache().await? {
                    debug!("applying cached state tree");
                    self.store.replace(&cached)?;
                }
            }

            self.persist_mounted().await;

            info!(name = %name, "loaded saved logbook");
            return Ok(InitOutcome::Loaded { name });
        }

        debug!(resource = %self.config.bootstrap_resource, "no saved logbook; fetching bootstrap campaign");
        let doc = self
            .content
            .fetch_json(&self.config.bootstrap_resource)
            .await?;
        let logbook = convert_campaign(&doc)?;
        let name = logbook.name.clone();

        let index = self.bookshelf.push(logbook);
        self.bookshelf.mount(index, &mut self.store)?;
        self.reconcile_contacts().await;
        self.persist_mounted().await;

        info!(name = %name, "bootstrapped logbook from campaign");
        Ok(InitOutcome::Bootstrapped { name })
    }

    /// Whether the user must supply a logbook before play can continue.
    pub fn requires_import(&self) -> bool {
        self.init_failed || self.bookshelf.mounted().is_none()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The live state store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Mutable access to the live state store.
    ///
    /// Direct writes are not persisted until the next logbook operation.
    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    pub fn bookshelf(&self) -> &Bookshelf {
        &self.bookshelf
    }

    /// The mounted logbook.
    pub fn mounted(&self) -> Option<&Logbook> {
        self.bookshelf.mounted()
    }

    /// Outcome of the latest automatic save.
    pub fn last_save(&self) -> &SaveStatus {
        &self.last_save
    }

    /// Move the browsing cursor forward.
    pub fn next_book(&mut self) {
        self.bookshelf.next_book();
    }

    /// Move the browsing cursor back.
    pub fn prev_book(&mut self) {
        self.bookshelf.prev_book();
    }

    // =========================================================================
    // Logbook operations
    // =========================================================================

    /// Append an entry to the mounted logbook, embedding a snapshot of the live state.
    pub async fn append_entry(&mut self, mut input: EntryInput) -> Result<Entry> {
        if input.author.is_none() {
            input.author = Some(self.config.default_author.clone());
        }

        let logbook = self
            .bookshelf
            .mounted_mut()
            .ok_or(LogbookError::NoActiveLogbook)?;
        let entry = logbook::append(logbook, &self.store, input)?;

        debug!(id = %entry.id, "appended entry");
        self.persist_mounted().await;
        Ok(entry)
    }

    /// Rewind the mounted logbook to `entry_id`, discarding every later entry.
    pub async fn revert_to(&mut self, entry_id: &str) -> Result<()> {
        let logbook = self
            .bookshelf
            .mounted_mut()
            .ok_or(LogbookError::NoActiveLogbook)?;
        logbook::revert(logbook, &mut self.store, entry_id)?;

        self.persist_mounted().await;
        Ok(())
    }

    /// Mount the logbook at `index`, restoring state from its latest entry.
    pub async fn mount(&mut self, index: usize) -> Result<()> {
        self.bookshelf.mount(index, &mut self.store)?;
        self.init_failed = false;
        self.persist_mounted().await;
        Ok(())
    }

    /// Mount the logbook under the browsing cursor.
    pub async fn mount_current(&mut self) -> Result<()> {
        let index = self.bookshelf.current_index();
        self.mount(index).await
    }

    /// Import a portable logbook file onto the shelf, unmounted.
    ///
    /// The display name is de-duplicated against the shelf. Returns the new index.
    pub async fn import_file(&mut self, content: &str) -> Result<usize> {
        let mut logbook = parse_import(content)?;
        logbook.name = self.bookshelf.unique_name(&logbook.name);
        let name = logbook.name.clone();
        let index = self.bookshelf.push(logbook);

        info!(index, name = %name, "imported logbook");
        self.persist_mounted().await;
        Ok(index)
    }

    /// Export the logbook at `index` to the portable file format.
    pub fn export(&self, index: usize) -> Result<String> {
        let logbook = self
            .bookshelf
            .get(index)
            .ok_or(LogbookError::InvalidIndex {
                index,
                len: self.bookshelf.len(),
            })?;
        export_file(logbook)
    }

    /// Export the mounted logbook.
    pub fn export_mounted(&self) -> Result<String> {
        let logbook = self.bookshelf.mounted().ok_or(LogbookError::NoActiveLogbook)?;
        export_file(logbook)
    }

    /// Start over with an empty logbook and default state.
    ///
    /// Contact definitions are reconciled into the fresh state. Returns the new index.
    pub async fn start_fresh(&mut self, name: &str) -> Result<usize> {
        let logbook = Logbook::new(self.bookshelf.unique_name(name));
        let index = self.bookshelf.push(logbook);

        self.store.reset();
        self.bookshelf.mount(index, &mut self.store)?;
        self.init_failed = false;
        self.reconcile_contacts().await;
        self.persist_mounted().await;
        Ok(index)
    }

    /// Fetch contact definitions and merge them into the live state.
    ///
    /// Only call this on fresh-start paths; after a restore the snapshot's
    /// contact state is authoritative.
    pub async fn reload_contacts(&mut self) -> Result<()> {
        let doc = self
            .content
            .fetch_json(&self.config.contacts_resource)
            .await?;
        let defs = ContactDefinitions::from_value(&doc)
            .map_err(|e| LogbookError::InvalidStructure(e.to_string()))?;
        reconcile(&defs, &mut self.store);
        Ok(())
    }

    async fn reconcile_contacts(&mut self) {
        if let Err(e) = self.reload_contacts().await {
            warn!(error = %e, "contact definitions unavailable; keeping current contacts");
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write the mounted logbook and the state cache.
    ///
    /// Fails with [`LogbookError::SaveInProgress`] if another save is running.
    pub async fn save_all(&self) -> Result<()> {
        let logbook = self.bookshelf.mounted().ok_or(LogbookError::NoActiveLogbook)?;
        self.persistor.save(logbook, Some(self.store.state())).await
    }

    async fn persist_mounted(&mut self) {
        self.last_save = match self.save_all().await {
            Ok(()) => SaveStatus::Saved,
            Err(LogbookError::SaveInProgress) | Err(LogbookError::NoActiveLogbook) => {
                SaveStatus::Skipped
            }
            Err(e) => {
                warn!(error = %e, "failed to persist logbook; keeping in-memory state");
                SaveStatus::Failed(e.to_string())
            }
        };
    }

    /// Save one last time and tear down.
    pub async fn shutdown(self) -> Result<()> {
        match self.save_all().await {
            Ok(()) | Err(LogbookError::NoActiveLogbook) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::persist::MemoryStorage;
    use crate::testing::{
        sample_campaign, sample_contacts, FailingStorage, SlowStorage, StaticContent,
    };
    use serde_json::json;

    fn manager_with(storage: impl Storage + 'static, content: StaticContent) -> SaveManager {
        SaveManager::new(ManagerConfig::new(), Box::new(storage), Box::new(content))
    }

    fn full_content() -> StaticContent {
        StaticContent::new()
            .with("campaign.json", sample_campaign())
            .with("contacts.json", sample_contacts())
    }

    #[tokio::test]
    async fn test_bootstrap_path() {
        let mut manager = manager_with(MemoryStorage::new(), full_content());
        let outcome = manager.initialize().await;

        assert_eq!(
            outcome,
            InitOutcome::Bootstrapped {
                name: "Aqua Nova: Descent".to_string()
            }
        );
        assert!(!manager.requires_import());
        assert_eq!(manager.last_save(), &SaveStatus::Saved);
        // State comes from the last campaign entry, with contacts reconciled on top.
        assert_eq!(manager.store().get("navigation.depth"), Some(&json!(150.0)));
        assert_eq!(
            manager.store().get("contacts.crew.chief.name"),
            Some(&json!("Mara Okafor"))
        );
    }

    #[tokio::test]
    async fn test_unreachable_bootstrap_requires_import() {
        let mut manager = manager_with(MemoryStorage::new(), StaticContent::new());
        let outcome = manager.initialize().await;

        assert!(matches!(outcome, InitOutcome::RequiresImport { .. }));
        assert!(manager.requires_import());
        assert!(manager.bookshelf().is_empty());
    }

    #[tokio::test]
    async fn test_local_load_persists_mounted() {
        let saved = convert_campaign(&sample_campaign()).unwrap();
        let content = serde_json::to_string(&saved).unwrap();
        let storage = MemoryStorage::new().with_slot("aquanova_logbook", content);
        let mut manager = manager_with(storage, StaticContent::new());

        assert!(matches!(
            manager.initialize().await,
            InitOutcome::Loaded { .. }
        ));
        assert_eq!(manager.last_save(), &SaveStatus::Saved);
        assert_eq!(manager.store().get("navigation.depth"), Some(&json!(150.0)));
    }

    #[tokio::test]
    async fn test_corrupt_slot_requires_import() {
        let storage = MemoryStorage::new().with_slot("aquanova_logbook", "{not json");
        let mut manager = manager_with(storage, full_content());
        assert!(matches!(
            manager.initialize().await,
            InitOutcome::RequiresImport { .. }
        ));
        assert!(manager.requires_import());
    }

    #[tokio::test]
    async fn test_append_requires_mounted_logbook() {
        let mut manager = manager_with(MemoryStorage::new(), StaticContent::new());
        let err = manager.append_entry(EntryInput::new("test")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoActiveLogbook);
    }

    #[tokio::test]
    async fn test_append_uses_configured_author() {
        let mut manager = SaveManager::new(
            ManagerConfig::new().with_default_author(crate::logbook::Author {
                name: "Lt. Osei".to_string(),
                ..Default::default()
            }),
            Box::new(MemoryStorage::new()),
            Box::new(StaticContent::new()),
        );
        manager.start_fresh("Patrol").await.unwrap();

        let entry = manager.append_entry(EntryInput::new("test")).await.unwrap();
        assert_eq!(entry.id, "LOG-0001");
        assert_eq!(entry.author.name, "Lt. Osei");
        assert_eq!(manager.mounted().unwrap().statistics.total_entries, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_memory_state() {
        let mut manager = manager_with(FailingStorage, StaticContent::new());
        manager.start_fresh("Doomed Disk").await.unwrap();

        let entry = manager.append_entry(EntryInput::new("still here")).await.unwrap();
        assert!(matches!(manager.last_save(), SaveStatus::Failed(_)));
        assert_eq!(manager.mounted().unwrap().entry(&entry.id), Some(&entry));
    }

    #[tokio::test]
    async fn test_import_dedupes_and_stays_unmounted() {
        let mut manager = manager_with(MemoryStorage::new(), full_content());
        manager.initialize().await;
        let export = manager.export_mounted().unwrap();

        let index = manager.import_file(&export).await.unwrap();
        let imported = manager.bookshelf().get(index).unwrap();
        assert_eq!(imported.name, "Aqua Nova: Descent (1)");
        assert!(!imported.mounted);
        assert_eq!(manager.bookshelf().mounted_index(), Some(0));

        let err = manager.import_file("{}").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStructure);
    }

    #[tokio::test]
    async fn test_import_then_mount_clears_requires_import() {
        let mut manager = manager_with(MemoryStorage::new(), StaticContent::new());
        manager.initialize().await;
        assert!(manager.requires_import());

        let index = manager
            .import_file(&sample_campaign().to_string())
            .await
            .unwrap();
        assert!(manager.requires_import());

        manager.mount(index).await.unwrap();
        assert!(!manager.requires_import());
        assert_eq!(manager.last_save(), &SaveStatus::Saved);
    }

    #[tokio::test]
    async fn test_mount_invalid_index() {
        let mut manager = manager_with(MemoryStorage::new(), StaticContent::new());
        let err = manager.mount(0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIndex);
        let err = manager.export(3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIndex);
    }

    #[tokio::test]
    async fn test_overlapping_save_all() {
        let mut manager = manager_with(SlowStorage::default(), StaticContent::new());
        manager.start_fresh("Rapid Fire").await.unwrap();

        let (first, second) = tokio::join!(manager.save_all(), manager.save_all());
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err().kind(), ErrorKind::SaveInProgress);
    }

    #[tokio::test]
    async fn test_start_fresh_resets_state() {
        let mut manager = manager_with(MemoryStorage::new(), full_content());
        manager.store_mut().set("navigation.depth", json!(3000.0));

        let index = manager.start_fresh("New Dive").await.unwrap();
        assert_eq!(manager.bookshelf().mounted_index(), Some(index));
        assert_eq!(manager.store().get("navigation.depth"), Some(&json!(0.0)));
        assert!(manager.store().get("contacts.external.topside").is_some());
    }

    #[tokio::test]
    async fn test_shutdown_saves() {
        let mut manager = manager_with(MemoryStorage::new(), StaticContent::new());
        assert!(manager.start_fresh("Last Words").await.is_ok());
        assert!(manager.shutdown().await.is_ok());
    }
}
