//! The logbook repository.
//!
//! A [`Bookshelf`] holds every known logbook plus a browsing cursor. The
//! cursor is independent of which logbook is mounted; at most one logbook
//! is mounted at any time.

use crate::error::{LogbookError, Result};
use crate::logbook::Logbook;
use crate::state::Stateful;
use tracing::info;

/// Ordered collection of logbooks with a browsing cursor.
#[derive(Debug, Clone, Default)]
pub struct Bookshelf {
    books: Vec<Logbook>,
    current_index: usize,
}

impl Bookshelf {
    /// Create an empty bookshelf.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// All logbooks in shelf order.
    pub fn books(&self) -> &[Logbook] {
        &self.books
    }

    pub fn get(&self, index: usize) -> Option<&Logbook> {
        self.books.get(index)
    }

    /// The browsing cursor.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The logbook under the browsing cursor.
    pub fn current(&self) -> Option<&Logbook> {
        self.books.get(self.current_index)
    }

    /// Advance the cursor, wrapping at the end. No-op when empty.
    pub fn next_book(&mut self) {
        if !self.books.is_empty() {
            self.current_index = (self.current_index + 1) % self.books.len();
        }
    }

    /// Move the cursor back, wrapping at the start. No-op when empty.
    pub fn prev_book(&mut self) {
        if !self.books.is_empty() {
            let len = self.books.len();
            self.current_index = (self.current_index + len - 1) % len;
        }
    }

    /// Index of the mounted logbook, if any.
    pub fn mounted_index(&self) -> Option<usize> {
        self.books.iter().position(|b| b.mounted)
    }

    pub fn mounted(&self) -> Option<&Logbook> {
        self.books.iter().find(|b| b.mounted)
    }

    pub fn mounted_mut(&mut self) -> Option<&mut Logbook> {
        self.books.iter_mut().find(|b| b.mounted)
    }

    /// Add a logbook to the end of the shelf and return its index.
    ///
    /// The logbook is added unmounted; use [`Bookshelf::mount`] to activate it.
    pub fn push(&mut self, mut logbook: Logbook) -> usize {
        logbook.mounted = false;
        self.books.push(logbook);
        self.books.len() - 1
    }

    /// Return `name`, or `name (n)` with the smallest `n >= 1` not already on the shelf.
    pub fn unique_name(&self, name: &str) -> String {
        let taken = |candidate: &str| self.books.iter().any(|b| b.name == candidate);
        if !taken(name) {
            return name.to_string();
        }
        (1..)
            .map(|n| format!("{name} ({n})"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    /// Mount the logbook at `index`, unmounting any other.
    ///
    /// `state` is restored from the snapshot of the target's last entry, if any.
    /// The browsing cursor moves to the mounted logbook.
    pub fn mount(&mut self, index: usize, state: &mut impl Stateful) -> Result<()> {
        if index >= self.books.len() {
            return Err(LogbookError::InvalidIndex {
                index,
                len: self.books.len(),
            });
        }

        if let Some(snapshot) = self.books[index].latest_snapshot() {
            state.restore(snapshot)?;
        }

        for (i, book) in self.books.iter_mut().enumerate() {
            book.mounted = i == index;
        }
        self.current_index = index;

        info!(index, name = %self.books[index].name, "mounted logbook");
        Ok(())
    }

    /// Unmount whatever is mounted.
    pub fn unmount_all(&mut self) {
        for book in &mut self.books {
            book.mounted = false;
        }
    }
}
