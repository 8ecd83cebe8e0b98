//! Error types for column alteration.
//!
//! Faults only: expected outcomes such as an unknown column or data that
//! violates a new constraint are reported through
//! [`Outcome`](crate::outcome::Outcome) instead.

use crate::fields::ParseError;

/// Errors that stop a [`SchemaMutator`](crate::mutator::SchemaMutator) from
/// doing its job.
#[derive(Debug, thiserror::Error)]
pub enum AlterError {
    /// The catalog has no usable creation SQL for the table.
    #[error("No such table: '{0}'")]
    TableNotFound(String),

    /// The creation SQL is not a `CREATE TABLE name (...)` statement we can split.
    #[error("Failed to parse creation SQL for table '{table}': {source}")]
    Parse {
        /// Table whose creation SQL was rejected.
        table: String,
        /// Underlying splitter error.
        #[source]
        source: ParseError,
    },

    /// Database error outside the handled integrity-violation path.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for alteration operations.
pub type Result<T> = std::result::Result<T, AlterError>;
