use common::{AggregateId, SequenceNumber};
use thiserror::Error;

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Appending an event collided with the unique index on
    /// `(aggregate_id, sequence_number)`: either a gap-filling write raced
    /// this one or the same sequence number was committed twice.
    #[error("sequence conflict for aggregate {aggregate_id} at sequence {sequence_number}")]
    SequenceConflict {
        aggregate_id: AggregateId,
        sequence_number: SequenceNumber,
    },

    /// The commit batch itself is malformed (duplicate positions).
    #[error("invalid commit batch: {0}")]
    InvalidCommit(String),

    /// A registered handler failed during fan-out. The write log is already
    /// persisted when this is raised; view state may be partially updated.
    #[error("event handler failed on {event_type}: {source}")]
    Handler {
        event_type: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// An event row could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] model::SerializationError),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
