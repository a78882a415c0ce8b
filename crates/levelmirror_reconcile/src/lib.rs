//! # levelmirror reconcile
//!
//! Tail reconciliation between the local mirror and the remote catalog.
//!
//! The remote listing is usually sorted newest first but intermittently
//! duplicates, omits or displaces entries. Reconciliation therefore never
//! diffs pages positionally. It works in two phases:
//!
//! 1. [`Reconciler::match_tails`] grows two lazy [`SequenceWindow`]s and finds
//!    a [`TailAnchor`], a pair of positions where both sides hold the same
//!    level. A tolerant batch match locates the neighbourhood, an overshoot
//!    search pins the exact pair.
//! 2. [`Reconciler::run`] walks from the anchor toward the newest entries,
//!    plans [`Mutation`]s and applies them through a [`MirrorApplier`].
//!
//! ## Key Invariants
//!
//! - Nothing is mutated unless an anchor was found
//! - Page loads are bounded; past the bound the run fails with drift
//! - Re-running after a successful run plans no mutations

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod applier;
mod config;
mod error;
mod matcher;
mod plan;
mod reconciler;
mod source;
mod window;

pub use applier::{GatewayApplier, MemoryApplier, MirrorApplier};
pub use config::ReconcileConfig;
pub use error::{ReconcileError, ReconcileResult};
pub use matcher::{TailAnchor, TailMatch};
pub use plan::Mutation;
pub use reconciler::{Reconciler, SyncReport};
pub use source::{
    JsonPageSource, LocalPageSource, MemoryPageSource, PageSource, Side, DEFAULT_JSON_ENDPOINT,
};
pub use window::SequenceWindow;
