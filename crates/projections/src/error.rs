//! Replay session error types.

use thiserror::Error;

/// Errors that can occur while staging or flushing read-model records.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An update or exactly-one lookup matched no staged record.
    #[error("no record in {table} matches {criteria}")]
    RecordNotFound {
        table: &'static str,
        criteria: String,
    },

    /// The bulk COPY stream failed or finished with a non-OK status.
    /// The whole commit fails; the session is cleared regardless.
    #[error("bulk copy into {table} failed: {message}")]
    BulkCopy {
        table: &'static str,
        message: String,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for replay session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
