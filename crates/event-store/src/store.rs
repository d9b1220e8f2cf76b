use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use common::AggregateId;
use model::Event;

use crate::{Command, EventStoreError, Result, StoredEvent};

/// A stream of raw event rows, as supplied to [`EventStore::replay_events`].
/// The lifetime allows suppliers to borrow the connection they stream from.
pub type RawEventStream<'a> = Pin<Box<dyn Stream<Item = Result<StoredEvent>> + Send + 'a>>;

/// Result type for event handlers; the error is opaque to the store.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Ordering of a replay stream.
///
/// Replay dispatch preserves whatever order the supplier produces; this
/// enum is how a supplier makes that choice explicit. Per-aggregate
/// ordering is always guaranteed by both variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayOrder {
    /// Global insertion order across all aggregates.
    #[default]
    Insertion,
    /// Grouped by aggregate, ascending sequence number within each.
    PerAggregate,
}

/// A read-model handler fed by the event store.
///
/// Handlers are registered when the store is configured; there is no
/// dynamic registration during a command.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_message(&self, event: &Event) -> HandlerResult;
}

/// Core trait for event store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persists one command row and one event row per event in a single
    /// transaction, then delivers every event to every registered handler
    /// in emission order.
    ///
    /// A handler failure after the transaction has committed does not roll
    /// persistence back; it surfaces as [`EventStoreError::Handler`] with
    /// the log already durable.
    async fn commit_events(&self, command: &Command, events: &[Event]) -> Result<()>;

    /// Returns all events for the aggregate ordered by ascending sequence
    /// number, decoded through the store's event-type registry.
    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<Event>>;

    /// Consumes the supplier's stream of raw event rows, decodes each and
    /// dispatches it to all registered handlers. Returns the number of
    /// events dispatched.
    ///
    /// Ordering across aggregates is whatever the supplier produced; see
    /// [`ReplayOrder`].
    async fn replay_events(&self, stream: RawEventStream<'_>) -> Result<u64>;
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn commit_events(&self, command: &Command, events: &[Event]) -> Result<()> {
        (**self).commit_events(command, events).await
    }

    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<Event>> {
        (**self).load_events(aggregate_id).await
    }

    async fn replay_events(&self, stream: RawEventStream<'_>) -> Result<u64> {
        (**self).replay_events(stream).await
    }
}

/// Rejects commit batches that collide with themselves: two events claiming
/// the same `(aggregate_id, sequence_number)` would fail the unique index
/// anyway, but catching it here avoids the round-trip.
pub fn validate_events_for_commit(events: &[Event]) -> Result<()> {
    let mut seen = HashSet::new();
    for event in events {
        if !seen.insert((event.aggregate_id(), event.sequence_number())) {
            return Err(EventStoreError::InvalidCommit(format!(
                "duplicate position {} for aggregate {}",
                event.sequence_number(),
                event.aggregate_id()
            )));
        }
    }
    Ok(())
}

/// Delivers events to handlers: events in order, every handler per event.
pub(crate) async fn fan_out(handlers: &[Arc<dyn EventHandler>], events: &[Event]) -> Result<()> {
    for event in events {
        for handler in handlers {
            handler
                .handle_message(event)
                .await
                .map_err(|source| EventStoreError::Handler {
                    event_type: event.type_name(),
                    source,
                })?;
        }
    }
    Ok(())
}
