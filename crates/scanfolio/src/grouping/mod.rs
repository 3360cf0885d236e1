//! Grouping engine: a pure projection from a result snapshot to document groups.
//!
//! Groups are never stored. They are re-derived from the snapshot on every read; the only
//! caching is memoization keyed on snapshot identity.

pub mod key;
pub mod merge;
pub mod order;

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use moka::sync::Cache;
use serde::Serialize;
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::model::PageResult;
use crate::store::Snapshot;

pub use key::{group_key, normalize_key_part, IDENTIFIER_PLACEHOLDER, SUBJECT_PLACEHOLDER};
pub use merge::merge_groups;
pub use order::parse_page_estimate;

/// Title used when no page offers a folder title or subject.
pub const UNTITLED: &str = "untitled";

/// A cluster of pages believed to form one logical document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentGroup {
    /// Partition key, stable for as long as the pages keep their grouping fields.
    pub id: String,
    pub title: String,
    pub category: String,
    /// False as soon as any page was judged unsafe.
    pub is_safe: bool,
    pub tags: BTreeSet<String>,
    pub page_count: usize,
    pub pages: Vec<PageResult>,
}

impl DocumentGroup {
    fn from_pages(id: String, mut pages: Vec<PageResult>) -> Self {
        order::sort_pages(&mut pages);

        let representative = pages
            .iter()
            .find(|p| !p.is_error())
            .or_else(|| pages.first());

        let title = representative
            .and_then(|p| {
                non_blank(p.analysis.folder_title.as_deref())
                    .or_else(|| non_blank(p.analysis.subject.as_deref()))
            })
            .unwrap_or(UNTITLED)
            .to_string();
        let category = representative
            .map(|p| p.analysis.category.clone())
            .unwrap_or_default();

        let is_safe = pages.iter().all(|p| p.analysis.is_safe);
        let tags = pages.iter().flat_map(|p| p.tags.iter().cloned()).collect();

        Self {
            id,
            title,
            category,
            is_safe,
            tags,
            page_count: pages.len(),
            pages,
        }
    }

    pub fn contains_page(&self, page_number: u32) -> bool {
        self.pages.iter().any(|p| p.page_number == page_number)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accent- and case-folded form of a title: NFD, combining marks dropped, lowercased.
///
/// `"Énergie"` folds to `"energie"` and sorts before `"Zebra"`.
fn collation_key(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Title order that ignores accents and case, then falls back to the lowercased and exact titles,
/// with the group id as a deterministic tie-break.
fn compare_titles(a: &DocumentGroup, b: &DocumentGroup) -> Ordering {
    collation_key(&a.title)
        .cmp(&collation_key(&b.title))
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.id.cmp(&b.id))
}

/// Computes the document groups of a result set.
///
/// Confirmed duplicates and pages still awaiting a duplicate decision are left out; every other
/// page lands in exactly one group.
pub fn group(results: &[PageResult]) -> Vec<DocumentGroup> {
    let mut partitions: HashMap<String, Vec<PageResult>> = HashMap::new();
    for page in results.iter().filter(|p| p.is_groupable()) {
        partitions
            .entry(group_key(page))
            .or_default()
            .push(page.clone());
    }

    let mut groups: Vec<DocumentGroup> = partitions
        .into_iter()
        .map(|(id, pages)| DocumentGroup::from_pages(id, pages))
        .collect();
    groups.sort_by(compare_titles);
    groups
}

const DEFAULT_CACHE_CAPACITY: u64 = 16;

/// Memoizes [`group`] per snapshot version.
pub struct GroupingEngine {
    cache: Cache<u64, Arc<Vec<DocumentGroup>>>,
}

impl GroupingEngine {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            cache: Cache::new(capacity),
        }
    }

    /// Groups for `snapshot`, plus whether they had to be recomputed.
    pub fn groups(&self, snapshot: &Snapshot) -> (Arc<Vec<DocumentGroup>>, bool) {
        if let Some(cached) = self.cache.get(&snapshot.version()) {
            return (cached, false);
        }

        let groups = Arc::new(group(snapshot.results()));
        debug!(
            version = snapshot.version(),
            groups = groups.len(),
            "Recomputed document groups"
        );
        self.cache.insert(snapshot.version(), Arc::clone(&groups));
        (groups, true)
    }
}

impl Default for GroupingEngine {
    fn default() -> Self {
        Self::new()
    }
}
