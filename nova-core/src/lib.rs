//! Versioned game-state persistence for the Aqua Nova DSV simulation.
//!
//! This crate provides:
//! - A single mutable world-state tree with path access and observers
//! - Logbooks: append-only narrative logs embedding full state snapshots
//! - Destructive revert to any earlier entry
//! - A bookshelf of logbooks with exactly one mounted at a time
//! - Campaign bootstrap, portable import/export and durable storage
//! - Contact reconciliation that never regresses learned state
//!
//! # Quick Start
//!
//! ```ignore
//! use nova_core::{EntryInput, ManagerConfig, SaveManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut manager = SaveManager::from_config(ManagerConfig::from_env());
//!     manager.initialize().await;
//!
//!     manager.store_mut().set("navigation.depth", serde_json::json!(120.0));
//!     let entry = manager.append_entry(EntryInput::new("Passing 120m")).await?;
//!
//!     manager.revert_to(&entry.id).await?;
//!     Ok(())
//! }
//! ```

pub mod bookshelf;
pub mod campaign;
pub mod config;
pub mod contacts;
pub mod content;
pub mod error;
pub mod logbook;
pub mod manager;
pub mod persist;
pub mod state;
pub mod testing;
pub mod value;

// Primary public API
pub use bookshelf::Bookshelf;
pub use config::ManagerConfig;
pub use error::{ErrorKind, LogbookError};
pub use logbook::{Author, Entry, EntryInput, Logbook, SCHEMA_VERSION};
pub use manager::{InitOutcome, SaveManager, SaveStatus};
pub use persist::{FileStorage, MemoryStorage, Storage};
pub use state::{Snapshot, StateStore, Stateful};
pub use testing::{StaticContent, TestHarness};
