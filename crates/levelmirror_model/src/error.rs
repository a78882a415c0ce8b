//! Error types for model conversions.

use thiserror::Error;

/// Result type for model conversions.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while turning wire data into model types.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A date field could not be read as an ISO date.
    #[error("invalid release date '{value}' for record {external_id}")]
    InvalidDate {
        /// External ID of the offending record.
        external_id: u64,
        /// Raw value received.
        value: String,
    },

    /// A mandatory field was empty.
    #[error("record {external_id} is missing field '{field}'")]
    MissingField {
        /// External ID of the offending record.
        external_id: u64,
        /// Field name.
        field: &'static str,
    },

    /// A page exceeded the fixed page size.
    #[error("page holds {actual} records, limit is {limit}")]
    OversizedPage {
        /// Maximum records per page.
        limit: usize,
        /// Records received.
        actual: usize,
    },
}
