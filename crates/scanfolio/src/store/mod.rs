//! Versioned result store.
//!
//! Holds the linear history of result-set snapshots. Every user-facing mutation goes through
//! [`ResultStore::set_state`] and becomes an undo step. Ingestion by the queue scheduler goes
//! through [`ResultStore::ingest`], which never creates an undo step: ingested pages stay visible
//! whichever snapshot the cursor points at.

pub mod history;
pub mod snapshot;

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::error::StoreError;
use crate::model::PageResult;

pub use history::History;
pub use snapshot::Snapshot;

/// How a write is recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Append a new snapshot and drop any redo branch.
    Undoable,
    /// Overwrite the live snapshot; no undo step is created.
    InPlace,
}

struct StoreState {
    history: History,
    next_page_number: u32,
}

pub struct ResultStore {
    state: RwLock<StoreState>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                history: History::new(Snapshot::empty()),
                next_page_number: 1,
            }),
        }
    }

    /// Creates a store whose history starts at `results`.
    pub fn with_results(results: Vec<PageResult>) -> Result<Self, StoreError> {
        let store = Self::new();
        store.reset_history(results)?;
        Ok(store)
    }

    /// The live snapshot.
    pub fn current(&self) -> Snapshot {
        self.read(|state| state.history.current().clone())
    }

    pub fn can_undo(&self) -> bool {
        self.read(|state| state.history.can_undo())
    }

    pub fn can_redo(&self) -> bool {
        self.read(|state| state.history.can_redo())
    }

    /// Number of snapshots in the history, including the live one.
    pub fn history_len(&self) -> usize {
        self.read(|state| state.history.len())
    }

    /// Replaces the live state with the output of `updater` as a new undo step.
    pub fn set_state<F>(&self, updater: F) -> Result<Snapshot, StoreError>
    where
        F: FnOnce(&Snapshot) -> Vec<PageResult>,
    {
        self.try_set_state_with(WriteMode::Undoable, |prev| Ok(updater(prev)))
    }

    /// Like [`set_state`](Self::set_state) for updaters that can reject the command.
    /// A rejected command leaves the history untouched.
    pub fn try_set_state<F>(&self, updater: F) -> Result<Snapshot, StoreError>
    where
        F: FnOnce(&Snapshot) -> Result<Vec<PageResult>, StoreError>,
    {
        self.try_set_state_with(WriteMode::Undoable, updater)
    }

    pub fn try_set_state_with<F>(&self, mode: WriteMode, updater: F) -> Result<Snapshot, StoreError>
    where
        F: FnOnce(&Snapshot) -> Result<Vec<PageResult>, StoreError>,
    {
        self.write(|state| {
            let next = updater(state.history.current())?;
            validate(&next)?;

            let snapshot = Snapshot::new(next);
            state.next_page_number = state.next_page_number.max(max_page_number(&snapshot) + 1);
            match mode {
                WriteMode::Undoable => state.history.push(snapshot.clone()),
                WriteMode::InPlace => state.history.replace_current(snapshot.clone()),
            }
            debug!(
                version = snapshot.version(),
                results = snapshot.len(),
                ?mode,
                "Result store updated"
            );
            Ok(snapshot)
        })
    }

    /// Appends freshly processed pages without creating an undo step.
    ///
    /// `build` receives the live snapshot and the first free page number, and returns the pages
    /// to append. It runs under the write lock, so the pages it derives (duplicate flags, page
    /// numbers) are consistent with what it saw. The pages are appended to every snapshot in the
    /// history, so undoing an earlier edit never hides them.
    pub fn ingest<F>(&self, build: F) -> Result<Vec<PageResult>, StoreError>
    where
        F: FnOnce(&Snapshot, u32) -> Vec<PageResult>,
    {
        self.write(|state| {
            let pages = build(state.history.current(), state.next_page_number);
            if pages.is_empty() {
                return Ok(pages);
            }

            state.history.append_everywhere(&pages, validate)?;
            let highest = pages.iter().map(|p| p.page_number).max().unwrap_or(0);
            state.next_page_number = state.next_page_number.max(highest + 1);
            debug!(
                appended = pages.len(),
                version = state.history.current().version(),
                "Ingested pages"
            );
            Ok(pages)
        })
    }

    /// Moves the cursor one step back. Returns false when there is nothing to undo.
    pub fn undo(&self) -> bool {
        self.write(|state| state.history.undo())
    }

    /// Moves the cursor one step forward. Returns false at the newest snapshot.
    pub fn redo(&self) -> bool {
        self.write(|state| state.history.redo())
    }

    /// Discards the whole history and starts over from `results`.
    pub fn reset_history(&self, results: Vec<PageResult>) -> Result<Snapshot, StoreError> {
        validate(&results)?;
        self.write(|state| {
            let snapshot = Snapshot::new(results);
            state.next_page_number = max_page_number(&snapshot) + 1;
            state.history = History::new(snapshot.clone());
            Ok(snapshot)
        })
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

fn max_page_number(results: &[PageResult]) -> u32 {
    results.iter().map(|r| r.page_number).max().unwrap_or(0)
}

fn validate(results: &[PageResult]) -> Result<(), StoreError> {
    let mut uuids = HashSet::with_capacity(results.len());
    let mut page_numbers = HashSet::with_capacity(results.len());

    for result in results {
        if result.uuid.trim().is_empty() {
            return Err(StoreError::Invariant(format!(
                "page {} has no uuid",
                result.page_number
            )));
        }
        if !uuids.insert(result.uuid.as_str()) {
            return Err(StoreError::Invariant(format!(
                "uuid '{}' appears more than once",
                result.uuid
            )));
        }
        if !page_numbers.insert(result.page_number) {
            return Err(StoreError::Invariant(format!(
                "page number {} appears more than once",
                result.page_number
            )));
        }
    }

    Ok(())
}
