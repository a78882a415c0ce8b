//! Error types for reconciliation.

use crate::source::Side;
use levelmirror_fetch::FetchError;
use levelmirror_model::{FailureClass, ModelError};
use levelmirror_store::StoreError;
use thiserror::Error;

/// Result type for reconciliation.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors that can occur during reconciliation.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Fetching a remote page failed.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Reading or writing the mirror failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A page could not be converted into records.
    #[error("malformed page: {0}")]
    Model(#[from] ModelError),

    /// No anchor could be established within the page bound.
    #[error("algorithmic drift: {reason} ({local_pages} local / {remote_pages} remote pages loaded)")]
    Drift {
        /// What ran out.
        reason: String,
        /// Local pages loaded.
        local_pages: u32,
        /// Remote pages loaded.
        remote_pages: u32,
    },

    /// An index past the end of a sequence window was read.
    #[error("{side} index {index} out of bounds (length {len})")]
    OutOfBounds {
        /// Which window.
        side: Side,
        /// Index requested.
        index: usize,
        /// Window length.
        len: usize,
    },
}

impl ReconcileError {
    /// Returns the failure class of this error.
    pub fn class(&self) -> FailureClass {
        match self {
            ReconcileError::Fetch(e) => e.class(),
            ReconcileError::Store(e) => e.class(),
            ReconcileError::Model(_) => FailureClass::IntegrityFailure,
            ReconcileError::Drift { .. } | ReconcileError::OutOfBounds { .. } => {
                FailureClass::AlgorithmicDrift
            }
        }
    }
}
