//! Properties of the grouping projection over mixed result sets.

mod common;

use std::collections::HashSet;

use common::*;
use scanfolio::grouping::{group, group_key, GroupingEngine};
use scanfolio::model::{Feedback, PageResult};
use scanfolio::store::Snapshot;

/// A mixed set: a three-page file, two loose pages sharing AI keys, an error, an unsafe page,
/// a pending duplicate and a confirmed one.
fn mixed_results() -> Vec<PageResult> {
    let original = PageResultBuilder::new(1).hash("h-a").file("f-1").subject("Lease").build();
    let mut confirmed = PageResultBuilder::new(9)
        .hash("h-a")
        .subject("Lease")
        .duplicate_of(&original)
        .build();
    confirmed.analysis.category = scanfolio::CONFIRMED_DUPLICATE_CATEGORY.to_string();

    vec![
        original.clone(),
        PageResultBuilder::new(2).file("f-1").subject("Lease").tag("home").build(),
        PageResultBuilder::new(3).file("f-1").subject("Lease").build(),
        PageResultBuilder::new(4)
            .subject("ACME S.p.A.")
            .identifier("INV-7")
            .page_estimate("2 of 2")
            .build(),
        PageResultBuilder::new(5)
            .subject(" acme  s.p.a ")
            .identifier("inv 7")
            .page_estimate("1 of 2")
            .feedback(Feedback::Good)
            .build(),
        PageResultBuilder::new(6).error("quota exceeded").build(),
        PageResultBuilder::new(7)
            .subject("Medical report")
            .unsafe_content()
            .build(),
        PageResultBuilder::new(8)
            .hash("h-a")
            .subject("Lease copy")
            .duplicate_of(&original)
            .build(),
        confirmed,
    ]
}

#[test]
fn test_every_groupable_page_lands_in_exactly_one_group() {
    let results = mixed_results();
    let groups = group(&results);

    let mut seen = HashSet::new();
    for page in groups.iter().flat_map(|g| g.pages.iter()) {
        assert!(seen.insert(page.page_number), "page {} grouped twice", page.page_number);
    }

    let expected: HashSet<u32> = results
        .iter()
        .filter(|p| p.is_groupable())
        .map(|p| p.page_number)
        .collect();
    assert_eq!(seen, expected);
    assert!(!seen.contains(&8));
    assert!(!seen.contains(&9));
}

#[test]
fn test_grouping_is_deterministic_under_input_order() {
    let results = mixed_results();
    let mut reversed = results.clone();
    reversed.reverse();

    assert_eq!(group(&results), group(&reversed));
}

#[test]
fn test_normalized_ai_keys_collapse_and_estimates_order_pages() {
    let groups = group(&mixed_results());
    let invoice = groups.iter().find(|g| g.contains_page(4)).unwrap();

    assert_eq!(invoice.page_count, 2);
    let order: Vec<u32> = invoice.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(order, vec![5, 4]);
    assert_eq!(invoice.id, group_key(&invoice.pages[0]));
}

#[test]
fn test_group_summary_fields() {
    let groups = group(&mixed_results());

    let lease = groups.iter().find(|g| g.contains_page(1)).unwrap();
    assert_eq!(lease.id, "file-f-1");
    assert_eq!(lease.title, "Lease");
    assert!(lease.tags.contains("home"));

    let medical = groups.iter().find(|g| g.contains_page(7)).unwrap();
    assert!(!medical.is_safe);
    assert!(groups.iter().filter(|g| !g.contains_page(7)).all(|g| g.is_safe));

    let titles: Vec<String> = groups.iter().map(|g| g.title.to_lowercase()).collect();
    let mut sorted = titles.clone();
    sorted.sort();
    assert_eq!(titles, sorted);
}

#[test]
fn test_engine_memoizes_per_snapshot() {
    let engine = GroupingEngine::new();
    let snapshot = Snapshot::new(mixed_results());

    let (first, recomputed) = engine.groups(&snapshot);
    assert!(recomputed);
    let (second, recomputed) = engine.groups(&snapshot.clone());
    assert!(!recomputed);
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    let (_, recomputed) = engine.groups(&Snapshot::new(mixed_results()));
    assert!(recomputed);
}
