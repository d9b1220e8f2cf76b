//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

/// Errors raised by an aggregate root itself.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// `load_from_history` was called with no events.
    #[error("cannot load aggregate from empty history")]
    EmptyHistory,

    /// The variant → handler table has no entry for a received event.
    #[error("no handler on {aggregate_type} for event {event_type}")]
    MissingHandler {
        aggregate_type: &'static str,
        event_type: &'static str,
    },

    /// A pre-built event was applied to an aggregate other than its own.
    #[error("event for aggregate {event_aggregate_id} applied to aggregate {aggregate_id}")]
    ForeignEvent {
        aggregate_id: AggregateId,
        event_aggregate_id: AggregateId,
    },
}

/// Errors raised by the aggregate repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A second aggregate object with an already-registered id was added.
    #[error("aggregate id {0} is already registered")]
    NonUniqueAggregateId(AggregateId),

    /// The identity map holds this id under a different aggregate type.
    #[error("aggregate {aggregate_id} is a {actual}, not a {expected}")]
    TypeMismatch {
        aggregate_id: AggregateId,
        expected: &'static str,
        actual: &'static str,
    },

    /// An aggregate failed while folding its history. An id the store has
    /// no events for surfaces here as `EmptyHistory`.
    #[error("aggregate error: {0}")]
    Aggregate(#[from] AggregateError),

    /// An error occurred in the event store.
    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),
}
