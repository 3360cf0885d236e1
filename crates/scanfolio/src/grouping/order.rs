use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::PageResult;

/// "3 of 5", "page 3/5", "pag. 3 di 5", "Seite 3 von 5", or a bare "3".
static PAGE_ESTIMATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:(?:/|of|di|de|von|sur)\s*\d+)?")
        .expect("page estimate pattern is valid")
});

/// Parses the numerator of a "page N of M" estimate.
pub fn parse_page_estimate(estimate: &str) -> Option<u32> {
    PAGE_ESTIMATE
        .captures(estimate)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Orders the pages of one group.
///
/// Uses the parsed estimates when every page has one and no two collide; otherwise falls back
/// to intake order.
pub fn sort_pages(pages: &mut [PageResult]) {
    let estimates: Vec<Option<u32>> = pages
        .iter()
        .map(|p| p.analysis.page_estimate.as_deref().and_then(parse_page_estimate))
        .collect();

    let usable = estimates.iter().all(Option::is_some) && {
        let distinct: HashSet<u32> = estimates.iter().flatten().copied().collect();
        distinct.len() == estimates.len()
    };

    if usable {
        pages.sort_by_key(|p| {
            (
                p.analysis
                    .page_estimate
                    .as_deref()
                    .and_then(parse_page_estimate)
                    .unwrap_or(u32::MAX),
                p.page_number,
            )
        });
    } else {
        pages.sort_by_key(|p| p.page_number);
    }
}
