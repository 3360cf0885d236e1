//! Content-hash duplicate detection.
//!
//! Duplicates form a flat star: every page sharing a hash points at the chronologically first
//! accepted page with that hash, never at another flagged page.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::model::{DuplicateRef, PageResult, CONFIRMED_DUPLICATE_CATEGORY};

/// Outcome of comparing one new page against the accepted pages of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DuplicateCheck {
    Accepted,
    FlaggedDuplicate(DuplicateRef),
}

/// Compares `candidate` against every accepted page in `existing`.
pub fn check(candidate: &PageResult, existing: &[PageResult]) -> DuplicateCheck {
    if candidate.content_hash.is_empty() {
        return DuplicateCheck::Accepted;
    }

    existing
        .iter()
        .filter(|r| r.uuid != candidate.uuid)
        .filter(|r| r.is_accepted() && r.content_hash == candidate.content_hash)
        .min_by_key(|r| r.page_number)
        .map(|original| {
            DuplicateCheck::FlaggedDuplicate(DuplicateRef {
                page_number: original.page_number,
                source_file_name: original.source_file_name.clone(),
                image_ref: original.uuid.clone(),
            })
        })
        .unwrap_or(DuplicateCheck::Accepted)
}

/// Flags each page of a commit batch against the snapshot plus the batch members before it,
/// so two identical pages arriving together still resolve to one original.
pub fn flag_batch(batch: Vec<PageResult>, existing: &[PageResult]) -> Vec<PageResult> {
    let mut seen: Vec<PageResult> = existing.to_vec();
    let mut flagged = Vec::with_capacity(batch.len());

    for mut page in batch {
        if let DuplicateCheck::FlaggedDuplicate(original) = check(&page, &seen) {
            info!(
                page_number = page.page_number,
                original = original.page_number,
                "Page flagged as potential duplicate"
            );
            page.is_potential_duplicate_of = Some(original);
        }
        seen.push(page.clone());
        flagged.push(page);
    }

    flagged
}

/// Marks a flagged page as a confirmed duplicate. The page stays in the result set so undo can
/// bring it back, but leaves every document group.
pub fn confirm_duplicate(
    results: &[PageResult],
    page_number: u32,
) -> Result<Vec<PageResult>, StoreError> {
    let mut next = results.to_vec();
    let page = next
        .iter_mut()
        .find(|r| r.page_number == page_number)
        .ok_or(StoreError::PageNotFound(page_number))?;

    if !page.is_pending_duplicate() {
        return Err(StoreError::NotADuplicate(page_number));
    }

    page.analysis.category = CONFIRMED_DUPLICATE_CATEGORY.to_string();
    Ok(next)
}

/// Clears a page's duplicate link so it re-enters grouping as an ordinary page.
pub fn deny_duplicate(
    results: &[PageResult],
    page_number: u32,
) -> Result<Vec<PageResult>, StoreError> {
    let mut next = results.to_vec();
    let page = next
        .iter_mut()
        .find(|r| r.page_number == page_number)
        .ok_or(StoreError::PageNotFound(page_number))?;

    if !page.is_pending_duplicate() {
        return Err(StoreError::NotADuplicate(page_number));
    }

    page.is_potential_duplicate_of = None;
    Ok(next)
}
