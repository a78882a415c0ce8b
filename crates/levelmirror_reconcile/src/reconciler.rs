//! The reconciler: match, plan, apply.

use crate::applier::MirrorApplier;
use crate::config::ReconcileConfig;
use crate::error::ReconcileResult;
use crate::matcher::{self, TailAnchor, TailMatch};
use crate::plan::{self, Mutation};
use crate::source::PageSource;
use std::time::{Duration, Instant};
use tracing::info;

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Anchor the run started from.
    pub anchor: TailAnchor,
    /// True if the anchor is the unverified batch match.
    pub anchor_fallback: bool,
    /// Levels inserted.
    pub inserted: usize,
    /// Levels updated.
    pub updated: usize,
    /// Levels deleted.
    pub deleted: usize,
    /// Every applied mutation, in order.
    pub mutations: Vec<Mutation>,
    /// Local pages loaded.
    pub local_pages: u32,
    /// Remote pages loaded.
    pub remote_pages: u32,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl SyncReport {
    /// Returns true if nothing was changed.
    pub fn is_noop(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Tail reconciler.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    /// Creates a reconciler.
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Finds the tail anchor between `local` and `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ReconcileError::Drift`] if the local tail cannot be
    /// filled or no shared level is found within the page bound.
    pub fn match_tails<'s>(
        &self,
        local: &'s dyn PageSource,
        remote: &'s dyn PageSource,
    ) -> ReconcileResult<TailMatch<'s>> {
        matcher::match_tails(&self.config, local, remote)
    }

    /// Plans the mutations implied by an anchor, without applying them.
    pub fn plan(
        &self,
        tail: &TailMatch<'_>,
        mirror: &dyn MirrorApplier,
    ) -> ReconcileResult<Vec<Mutation>> {
        plan::plan(tail, mirror)
    }

    /// Plans and applies the mutations implied by an anchor.
    ///
    /// Each mutation is applied on its own; the first failure stops the run
    /// and leaves earlier mutations in place.
    pub fn run(
        &self,
        tail: &TailMatch<'_>,
        mirror: &mut dyn MirrorApplier,
    ) -> ReconcileResult<SyncReport> {
        let started = Instant::now();
        let mutations = self.plan(tail, mirror)?;
        for mutation in &mutations {
            mirror.apply(mutation)?;
        }

        let count = |kind: &str| mutations.iter().filter(|m| m.kind() == kind).count();
        let report = SyncReport {
            anchor: tail.anchor,
            anchor_fallback: tail.fallback,
            inserted: count("insert"),
            updated: count("update"),
            deleted: count("delete"),
            local_pages: tail.local.pages_loaded(),
            remote_pages: tail.remote.pages_loaded(),
            elapsed: started.elapsed(),
            mutations,
        };
        info!(
            anchor = %report.anchor,
            fallback = report.anchor_fallback,
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            "reconciled"
        );
        Ok(report)
    }

    /// Matches tails and applies the resulting mutations.
    pub fn sync(
        &self,
        local: &dyn PageSource,
        remote: &dyn PageSource,
        mirror: &mut dyn MirrorApplier,
    ) -> ReconcileResult<SyncReport> {
        let started = Instant::now();
        let tail = self.match_tails(local, remote)?;
        let mut report = self.run(&tail, mirror)?;
        report.elapsed = started.elapsed();
        Ok(report)
    }
}
