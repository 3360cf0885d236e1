//! Observers notified after results are committed, e.g. a cloud document store mirror.

use std::sync::{Arc, PoisonError, RwLock};

use crate::grouping::{DocumentGroup, GroupingEngine};
use crate::model::PageResult;
use crate::store::Snapshot;

/// Receives committed results and recomputed groups.
///
/// Callbacks run on the scheduler's task after the store lock is released; they must not block.
pub trait ResultObserver: Send + Sync {
    /// An accepted, non-duplicate result was committed.
    fn on_result_committed(&self, _result: &PageResult) {}

    /// The grouping projection was recomputed for a new snapshot.
    fn on_groups_recomputed(&self, _groups: &[DocumentGroup]) {}
}

/// Fan-out point between the store and its observers.
#[derive(Clone, Default)]
pub struct CommitHooks {
    observers: Arc<RwLock<Vec<Arc<dyn ResultObserver>>>>,
    engine: Arc<GroupingEngine>,
}

impl CommitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn ResultObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Groups for `snapshot`, computed at most once per snapshot.
    pub fn groups(&self, snapshot: &Snapshot) -> Arc<Vec<DocumentGroup>> {
        let (groups, recomputed) = self.engine.groups(snapshot);
        if recomputed {
            for observer in self.observers() {
                observer.on_groups_recomputed(&groups);
            }
        }
        groups
    }

    /// Announces freshly ingested pages, then the groups of the snapshot that contains them.
    pub fn results_committed(&self, pages: &[PageResult], snapshot: &Snapshot) {
        let observers = self.observers();
        for page in pages.iter().filter(|p| p.is_accepted()) {
            for observer in &observers {
                observer.on_result_committed(page);
            }
        }
        self.groups(snapshot);
    }

    fn observers(&self) -> Vec<Arc<dyn ResultObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
