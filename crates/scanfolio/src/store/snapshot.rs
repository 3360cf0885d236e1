use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::model::PageResult;

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

/// One immutable version of the complete result set.
///
/// Cloning is cheap; clones share one page vector. `version` identifies the snapshot and is what
/// the grouping engine memoizes on.
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    results: Arc<Vec<PageResult>>,
}

impl Snapshot {
    pub fn new(results: Vec<PageResult>) -> Self {
        Self {
            version: NEXT_VERSION.fetch_add(1, Ordering::Relaxed),
            results: Arc::new(results),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn results(&self) -> &[PageResult] {
        &self.results
    }

    pub fn find_by_page(&self, page_number: u32) -> Option<&PageResult> {
        self.results.iter().find(|r| r.page_number == page_number)
    }

    pub fn find_by_uuid(&self, uuid: &str) -> Option<&PageResult> {
        self.results.iter().find(|r| r.uuid == uuid)
    }

    /// Owned copy of the pages, the starting point of every write.
    pub fn to_vec(&self) -> Vec<PageResult> {
        self.results.as_ref().clone()
    }
}

impl Deref for Snapshot {
    type Target = [PageResult];

    fn deref(&self) -> &Self::Target {
        &self.results
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version || self.results == other.results
    }
}
