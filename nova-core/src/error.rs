//! Error types for the persistence engine.
//!
//! Every fallible operation returns a [`LogbookError`]. Callers that need to
//! branch on the failure should match on [`LogbookError::kind`] rather than
//! the rendered message.

use thiserror::Error;

/// Errors from state, logbook and persistence operations.
#[derive(Debug, Error)]
pub enum LogbookError {
    #[error("No logbook is mounted")]
    NoActiveLogbook,

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Entry {0} has no game snapshot")]
    NoSnapshot(String),

    #[error("Entry {0} cannot be reverted to")]
    NonRevertible(String),

    #[error("Invalid logbook index {index} (bookshelf holds {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Snapshot failed: {0}")]
    SnapshotFailed(String),

    #[error("Bootstrap fetch failed: {0}")]
    BootstrapFetchFailed(String),

    #[error("A save is already in progress")]
    SaveInProgress,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fieldless classification of a [`LogbookError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoActiveLogbook,
    EntryNotFound,
    NoSnapshot,
    NonRevertible,
    InvalidIndex,
    InvalidStructure,
    SnapshotFailed,
    BootstrapFetchFailed,
    SaveInProgress,
    Storage,
}

impl LogbookError {
    /// Classify this error.
    ///
    /// IO failures count as storage failures; JSON failures count as
    /// structural failures of the document being read.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoActiveLogbook => ErrorKind::NoActiveLogbook,
            Self::EntryNotFound(_) => ErrorKind::EntryNotFound,
            Self::NoSnapshot(_) => ErrorKind::NoSnapshot,
            Self::NonRevertible(_) => ErrorKind::NonRevertible,
            Self::InvalidIndex { .. } => ErrorKind::InvalidIndex,
            Self::InvalidStructure(_) | Self::Json(_) => ErrorKind::InvalidStructure,
            Self::SnapshotFailed(_) => ErrorKind::SnapshotFailed,
            Self::BootstrapFetchFailed(_) => ErrorKind::BootstrapFetchFailed,
            Self::SaveInProgress => ErrorKind::SaveInProgress,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LogbookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            LogbookError::EntryNotFound("LOG-0009".into()).kind(),
            ErrorKind::EntryNotFound
        );
        assert_eq!(
            LogbookError::InvalidIndex { index: 4, len: 2 }.kind(),
            ErrorKind::InvalidIndex
        );

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            LogbookError::from(json_err).kind(),
            ErrorKind::InvalidStructure
        );
    }

    #[test]
    fn test_messages() {
        let err = LogbookError::InvalidIndex { index: 3, len: 1 };
        assert_eq!(err.to_string(), "Invalid logbook index 3 (bookshelf holds 1)");
        assert_eq!(
            LogbookError::NoActiveLogbook.to_string(),
            "No logbook is mounted"
        );
    }
}
