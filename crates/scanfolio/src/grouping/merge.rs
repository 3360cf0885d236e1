use std::collections::HashSet;

use crate::error::StoreError;
use crate::model::PageResult;

use super::key::{ai_parts_of, file_id_of};
use super::{group, DocumentGroup};

/// Moves every page of the listed groups into the first one.
///
/// Pages are re-keyed rather than linked: they take over the target's source file id, or the
/// normalized subject and identifier of the target's key (placeholders included), so the
/// projection places them together on the next read.
pub fn merge_groups(results: &[PageResult], ids: &[String]) -> Result<Vec<PageResult>, StoreError> {
    let unique: Vec<&String> = {
        let mut seen = HashSet::new();
        ids.iter().filter(|id| seen.insert(id.as_str())).collect()
    };
    if unique.len() < 2 {
        return Err(StoreError::InvalidMerge(
            "at least two distinct groups are required".to_string(),
        ));
    }

    let groups = group(results);
    let target = find_group(&groups, unique[0])?;

    let mut moving: HashSet<&str> = HashSet::new();
    for id in &unique[1..] {
        for page in &find_group(&groups, id)?.pages {
            moving.insert(page.uuid.as_str());
        }
    }

    let rekey = match (file_id_of(&target.id), ai_parts_of(&target.id)) {
        (Some(file_id), _) => Rekey::File(file_id.to_string()),
        (None, Some((subject, identifier))) => Rekey::Ai {
            subject: subject.to_string(),
            identifier: identifier.to_string(),
        },
        (None, None) => {
            return Err(StoreError::InvalidMerge(format!(
                "group '{}' has an unrecognized key",
                target.id
            )))
        }
    };

    let mut next = results.to_vec();
    for page in next.iter_mut().filter(|p| moving.contains(p.uuid.as_str())) {
        match &rekey {
            Rekey::File(file_id) => page.source_file_id = Some(file_id.clone()),
            Rekey::Ai {
                subject,
                identifier,
            } => {
                page.source_file_id = None;
                page.analysis.grouping_subject = Some(subject.clone());
                page.analysis.grouping_identifier = Some(identifier.clone());
            }
        }
    }

    Ok(next)
}

/// Key parts the moved pages take over from the target group.
enum Rekey {
    File(String),
    Ai { subject: String, identifier: String },
}

fn find_group<'a>(groups: &'a [DocumentGroup], id: &str) -> Result<&'a DocumentGroup, StoreError> {
    groups
        .iter()
        .find(|g| g.id == id)
        .ok_or_else(|| StoreError::GroupNotFound(id.to_string()))
}
