//! Error types for the database gateway.

use levelmirror_model::FailureClass;
use thiserror::Error;

/// Result type for gateway operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in gateway operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite error, including constraint violations.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No record with this external ID.
    #[error("record {external_id} not found")]
    RecordNotFound {
        /// External ID searched.
        external_id: u64,
    },

    /// A relation referenced a content row that does not exist.
    #[error("no {relation} row with key '{value}'")]
    MissingLookup {
        /// Relation name.
        relation: &'static str,
        /// Key searched.
        value: String,
    },

    /// A value cannot be represented in the schema.
    #[error("invalid value: {message}")]
    InvalidValue {
        /// Description of the problem.
        message: String,
    },

    /// Existing database was created by another schema version.
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersion {
        /// Version this build writes.
        expected: &'static str,
        /// Version found in the file.
        found: String,
    },
}

impl StoreError {
    /// Returns the failure class of this error.
    pub fn class(&self) -> FailureClass {
        FailureClass::DatabaseFailure
    }

    /// Returns true if this is a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
