//! Tail matching and planning over in-memory listings.

use levelmirror_reconcile::{
    MemoryApplier, MemoryPageSource, MirrorApplier, Mutation, ReconcileConfig, ReconcileError,
    Reconciler,
};
use levelmirror_model::{CatalogRecord, ExternalId};
use levelmirror_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::HashSet;

fn remote(records: Vec<CatalogRecord>) -> MemoryPageSource {
    MemoryPageSource::new("remote", records)
}

#[test]
fn single_upstream_deletion() {
    let mut mirror = MemoryApplier::new(levels(81..=100));
    let upstream = remote(levels((81..=100).filter(|&id| id != 90)));

    let report = Reconciler::default()
        .sync(&mirror.to_source(), &upstream, &mut mirror)
        .unwrap();

    assert_eq!(report.mutations, vec![Mutation::Delete(ExternalId(90))]);
    assert_eq!(mirror.len(), 19);
}

#[test]
fn new_levels_inserted_newest_first() {
    let mut mirror = MemoryApplier::new(levels(81..=100));
    let upstream = remote(levels((81..=102).filter(|&id| id != 90)));

    let report = Reconciler::default()
        .sync(&mirror.to_source(), &upstream, &mut mirror)
        .unwrap();

    let inserts: Vec<u64> = report
        .mutations
        .iter()
        .filter(|m| m.kind() == "insert")
        .map(|m| m.external_id().get())
        .collect();
    assert_eq!(inserts, vec![102, 101]);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.updated, 0);
}

#[test]
fn stale_level_above_anchor_is_updated() {
    let mut stale = level(150);
    stale.release = release_of(10);
    stale.title = "Level 150 (beta)".to_string();
    let mut records = levels(61..=100);
    records.push(stale);
    let mut mirror = MemoryApplier::new(records);
    let mut listing = levels([150]);
    listing.extend(levels(61..=100));
    let upstream = remote(listing);
    let reconciler = Reconciler::default();

    let first = reconciler
        .sync(&mirror.to_source(), &upstream, &mut mirror)
        .unwrap();

    assert_eq!(first.mutations, vec![Mutation::Update(level(150))]);
    assert_eq!(first.updated, 1);
    assert_eq!(mirror.lookup(ExternalId(150)).unwrap(), Some(level(150)));

    let second = reconciler
        .sync(&mirror.to_source(), &upstream, &mut mirror)
        .unwrap();
    assert!(second.is_noop(), "{:?}", second.mutations);
}

#[test]
fn unpaired_overshoot_falls_back_to_batch_anchor() {
    let mut mirror = MemoryApplier::new(levels(61..=100));
    let mut listing = levels([100]);
    listing.extend(levels(500..=560));
    let reconciler = Reconciler::default();

    let report = reconciler
        .sync(&mirror.to_source(), &remote(listing), &mut mirror)
        .unwrap();

    assert!(report.anchor_fallback);
    assert_eq!((report.anchor.local, report.anchor.remote), (0, 0));
    assert!(report.is_noop());

    let clean = reconciler
        .sync(&mirror.to_source(), &remote(levels(61..=100)), &mut mirror)
        .unwrap();
    assert!(!clean.anchor_fallback);
}

#[test]
fn identical_prefix_from_anchor_is_untouched() {
    let mut mirror = MemoryApplier::new(levels(1..=60));
    let mut listing = levels(1..=60);
    // Only the two newest entries changed.
    listing[0].title.push_str(" (remastered)");
    listing[1].title.push_str(" (remastered)");
    let upstream = remote(listing.clone());

    let report = Reconciler::default()
        .sync(&mirror.to_source(), &upstream, &mut mirror)
        .unwrap();

    assert_eq!(
        report.mutations,
        vec![
            Mutation::Update(listing[1].clone()),
            Mutation::Update(listing[0].clone())
        ]
    );
}

#[test]
fn multi_author_level_across_page_boundary() {
    let mirror = MemoryApplier::new(levels(1..=40));
    let mut rows = levels(23..=40);
    rows.extend(author_rows(22, &["alice", "bob", "carol"]));
    rows.extend(levels(1..=21));
    let upstream = remote(rows);
    let local = mirror.to_source();

    let reconciler = Reconciler::default();
    let tail = reconciler.match_tails(&local, &upstream).unwrap();
    let grouped = tail
        .remote
        .records()
        .iter()
        .find(|r| r.external_id.get() == 22)
        .unwrap();

    assert_eq!(grouped.authors, vec!["alice", "bob", "carol"]);
    assert_eq!(ids_of(&tail.remote.records()[..20]), ids_of(&levels(21..=40)));
    assert!(reconciler.plan(&tail, &mirror).unwrap().is_empty());
}

#[test]
fn small_catalog_terminates_with_drift() {
    let mut mirror = MemoryApplier::new(levels(1..=12));
    let upstream = remote(levels(1..=12));

    let err = Reconciler::default()
        .sync(&mirror.to_source(), &upstream, &mut mirror)
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Drift { .. }));
    assert_eq!(err.class().exit_code(), 5);
    assert!(mirror.applied().is_empty());
}

#[test]
fn small_match_size_on_small_pages() {
    let config = ReconcileConfig::new().with_match_size(2).with_max_pages(20);
    let mut mirror = MemoryApplier::new(levels(1..=30));
    let upstream = remote(levels((1..=33).filter(|id| id % 5 != 0))).with_page_size(3);
    let local = mirror.to_source().with_page_size(4);

    let report = Reconciler::new(config)
        .sync(&local, &upstream, &mut mirror)
        .unwrap();

    assert_eq!(report.inserted, 3);
    assert!(report.remote_pages > 1);
    assert!(report
        .mutations
        .iter()
        .all(|m| m.kind() != "delete" || m.external_id().get() % 5 == 0));
}

proptest! {
    #[test]
    fn anchor_pairs_equal_ids(listings in listings_strategy(20), page_size in 2usize..=20) {
        let local = MemoryPageSource::new("local", listings.local.clone()).with_page_size(page_size);
        let upstream = remote(listings.remote.clone());

        let tail = Reconciler::default().match_tails(&local, &upstream).unwrap();

        prop_assert_eq!(
            tail.local.get(tail.anchor.local).unwrap().external_id,
            tail.remote.get(tail.anchor.remote).unwrap().external_id
        );
        prop_assert!(tail.anchor.local < 20);
    }

    #[test]
    fn planned_mutations_are_consistent(listings in listings_strategy(20)) {
        let mut mirror = MemoryApplier::new(listings.local.clone());
        let local = mirror.to_source();
        let upstream = remote(listings.remote.clone());
        let reconciler = Reconciler::default();

        let tail = reconciler.match_tails(&local, &upstream).unwrap();
        let mutations = reconciler.plan(&tail, &mirror).unwrap();
        let listed: HashSet<_> = tail.remote.records().iter().map(|r| r.external_id).collect();

        let mut touched = HashSet::new();
        for mutation in &mutations {
            prop_assert!(touched.insert(mutation.external_id()), "{:?} planned twice", mutation);
            match mutation {
                Mutation::Delete(id) => prop_assert!(!listed.contains(id)),
                Mutation::Insert(record) => {
                    prop_assert!(!mirror.contains(record.external_id).unwrap());
                }
                Mutation::Update(record) => {
                    let existing = mirror.lookup(record.external_id).unwrap().unwrap();
                    prop_assert!(!existing.same_attributes(record));
                }
            }
        }
        for mutation in &mutations {
            mirror.apply(mutation).unwrap();
        }
    }
}
