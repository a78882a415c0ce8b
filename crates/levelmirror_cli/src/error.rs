//! Top-level error and exit codes.

use levelmirror_fetch::FetchError;
use levelmirror_model::FailureClass;
use levelmirror_reconcile::ReconcileError;
use levelmirror_store::StoreError;
use thiserror::Error;

/// Any failure of a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Fetch client failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Mirror database failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Reconciliation failure.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Output could not be written.
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),

    /// Bad arguments.
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    /// Returns the failure class, if this is a classified failure.
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            CliError::Fetch(e) => Some(e.class()),
            CliError::Store(e) => Some(e.class()),
            CliError::Reconcile(e) => Some(e.class()),
            CliError::Output(_) | CliError::Usage(_) => None,
        }
    }

    /// Process exit code; 1 for unclassified failures.
    pub fn exit_code(&self) -> u8 {
        self.class().map_or(1, FailureClass::exit_code)
    }
}
