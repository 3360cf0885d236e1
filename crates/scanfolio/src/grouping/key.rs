use crate::model::PageResult;

/// Stand-in when the model returned no grouping subject.
pub const SUBJECT_PLACEHOLDER: &str = "unknown-subject";

/// Stand-in when the model returned no grouping identifier.
pub const IDENTIFIER_PLACEHOLDER: &str = "no-identifier";

const FILE_PREFIX: &str = "file-";
const AI_PREFIX: &str = "ai-";

/// Lowercases and collapses everything that is not alphanumeric into single dashes.
///
/// `"  ACME  S.p.A. "` becomes `"acme-s-p-a"`.
pub fn normalize_key_part(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;

    for c in raw.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }

    out
}

fn part_or(raw: Option<&str>, placeholder: &str) -> String {
    let normalized = raw.map(normalize_key_part).unwrap_or_default();
    if normalized.is_empty() {
        placeholder.to_string()
    } else {
        normalized
    }
}

/// Partition key of a page. The originating file wins over the model's grouping keys.
pub fn group_key(page: &PageResult) -> String {
    if let Some(file_id) = page.source_file_id.as_deref().filter(|id| !id.is_empty()) {
        return format!("{}{}", FILE_PREFIX, file_id);
    }

    let subject = part_or(
        page.analysis
            .grouping_subject
            .as_deref()
            .or(page.analysis.subject.as_deref()),
        SUBJECT_PLACEHOLDER,
    );
    let identifier = part_or(
        page.analysis.grouping_identifier.as_deref(),
        IDENTIFIER_PLACEHOLDER,
    );

    format!("{}{}_{}", AI_PREFIX, subject, identifier)
}

/// The source file id encoded in a `file-` key.
pub fn file_id_of(key: &str) -> Option<&str> {
    key.strip_prefix(FILE_PREFIX)
}

/// The normalized subject and identifier encoded in an `ai-` key, placeholders included.
///
/// Normalized parts never contain `_`, so the separator is unambiguous.
pub fn ai_parts_of(key: &str) -> Option<(&str, &str)> {
    key.strip_prefix(AI_PREFIX)?.split_once('_')
}
