//! Property-based test generators using proptest.
//!
//! Remote listings are derived from a local listing the way the upstream
//! catalog drifts in practice: levels vanish, new ones appear on top,
//! attributes change and a few entries surface out of order.

use crate::fixtures::{level, levels};
use levelmirror_model::CatalogRecord;
use proptest::prelude::*;
use std::collections::HashSet;

/// A local mirror listing and a drifted remote listing of it.
#[derive(Debug, Clone)]
pub struct Listings {
    /// Local records, newest first.
    pub local: Vec<CatalogRecord>,
    /// Remote records, mostly newest first.
    pub remote: Vec<CatalogRecord>,
}

impl Listings {
    /// Returns true if any of the newest `tail_len` local levels is listed
    /// upstream.
    pub fn shares_tail(&self, tail_len: usize) -> bool {
        let remote: HashSet<_> = self.remote.iter().map(|r| r.external_id).collect();
        self.local
            .iter()
            .take(tail_len)
            .any(|r| remote.contains(&r.external_id))
    }
}

/// How a remote listing differs from the local one.
#[derive(Debug, Clone)]
pub struct Drift {
    /// Per local position (newest first): false if the level vanished upstream.
    pub keep: Vec<bool>,
    /// Per local position: true if the remote title changed.
    pub retitle: Vec<bool>,
    /// Number of new levels listed on top.
    pub new_levels: usize,
    /// Remote positions whose entry is moved `1..=2` places later.
    pub displace: Vec<(usize, usize)>,
    /// Local position that is always kept.
    pub pinned: usize,
}

impl Drift {
    /// Applies the drift to `local` (newest first, IDs `1..=len`).
    pub fn apply(&self, local: &[CatalogRecord]) -> Vec<CatalogRecord> {
        let top = local.iter().map(|r| r.external_id.get()).max().unwrap_or(0);
        let mut remote = levels(top + 1..=top + self.new_levels as u64);

        for (index, record) in local.iter().enumerate() {
            let kept = index == self.pinned || self.keep.get(index).copied().unwrap_or(true);
            if !kept {
                continue;
            }
            let mut record = record.clone();
            if self.retitle.get(index).copied().unwrap_or(false) {
                record.title.push_str(" (remastered)");
            }
            remote.push(record);
        }

        for &(from, by) in &self.displace {
            if remote.len() < 2 {
                break;
            }
            let from = from % remote.len();
            let to = (from + by).min(remote.len() - 1);
            let moved = remote.remove(from);
            remote.insert(to, moved);
        }
        remote
    }
}

/// Strategy for a drift over a local listing of `len` levels.
///
/// The pinned position lies within the newest `tail_len` levels.
pub fn drift_strategy(len: usize, tail_len: usize) -> impl Strategy<Value = Drift> {
    (
        prop::collection::vec(prop::bool::weighted(0.85), len),
        prop::collection::vec(prop::bool::weighted(0.1), len),
        0usize..=25,
        prop::collection::vec((any::<usize>(), 1usize..=2), 0..4),
        0..tail_len.min(len).max(1),
    )
        .prop_map(|(keep, retitle, new_levels, displace, pinned)| Drift {
            keep,
            retitle,
            new_levels,
            displace,
            pinned,
        })
}

/// Strategy for listings sharing at least one level within the newest
/// `tail_len` local levels.
pub fn listings_strategy(tail_len: usize) -> impl Strategy<Value = Listings> {
    (tail_len..tail_len * 4)
        .prop_flat_map(move |len| (Just(len), drift_strategy(len, tail_len)))
        .prop_map(|(len, drift)| {
            let local = levels(1..=len as u64);
            let remote = drift.apply(&local);
            Listings { local, remote }
        })
}

/// Strategy for a single fixture level with a random ID.
pub fn level_strategy() -> impl Strategy<Value = CatalogRecord> {
    (1u64..1_000_000).prop_map(level)
}
