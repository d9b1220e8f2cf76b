use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use model::{Event, EventTypeRegistry, serialize_event};
use tokio::sync::RwLock;

use crate::{
    AggregateId, Command, EventStoreError, Result, StoredEvent,
    store::{EventHandler, EventStore, RawEventStream, ReplayOrder, fan_out, validate_events_for_commit},
};

/// In-memory event store implementation for testing.
///
/// This implementation keeps commands and event rows in memory and provides
/// the same interface and invariants as the PostgreSQL implementation,
/// including uniqueness of `(aggregate_id, sequence_number)`.
#[derive(Clone)]
pub struct InMemoryEventStore {
    rows: Arc<RwLock<Vec<StoredEvent>>>,
    commands: Arc<RwLock<Vec<Command>>>,
    registry: Arc<EventTypeRegistry>,
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl InMemoryEventStore {
    /// Creates an empty store with no handlers.
    pub fn new(registry: Arc<EventTypeRegistry>) -> Self {
        Self::with_handlers(registry, Vec::new())
    }

    /// Creates an empty store with the given handler set.
    pub fn with_handlers(
        registry: Arc<EventTypeRegistry>,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) -> Self {
        Self {
            rows: Arc::new(RwLock::new(Vec::new())),
            commands: Arc::new(RwLock::new(Vec::new())),
            registry,
            handlers,
        }
    }

    /// Returns the total number of event rows stored.
    pub async fn event_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Returns the number of commands recorded.
    pub async fn command_count(&self) -> usize {
        self.commands.read().await.len()
    }

    /// Returns a copy of all commands in commit order.
    pub async fn commands(&self) -> Vec<Command> {
        self.commands.read().await.clone()
    }

    /// Returns a copy of all event rows in insertion order.
    pub async fn stored_events(&self) -> Vec<StoredEvent> {
        self.rows.read().await.clone()
    }

    /// Clears all commands and events.
    pub async fn clear(&self) {
        self.rows.write().await.clear();
        self.commands.write().await.clear();
    }

    /// Produces a replay stream over the stored rows in the given order.
    pub async fn stream_events(&self, order: ReplayOrder) -> RawEventStream<'static> {
        let mut rows = self.rows.read().await.clone();
        match order {
            ReplayOrder::Insertion => rows.sort_by_key(|row| row.id),
            ReplayOrder::PerAggregate => {
                rows.sort_by_key(|row| (row.aggregate_id.as_uuid(), row.sequence_number));
            }
        }
        Box::pin(futures_util::stream::iter(rows.into_iter().map(Ok)))
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn commit_events(&self, command: &Command, events: &[Event]) -> Result<()> {
        validate_events_for_commit(events)?;

        {
            let mut rows = self.rows.write().await;

            // Simulates the unique index on (aggregate_id, sequence_number).
            for event in events {
                let taken = rows.iter().any(|row| {
                    row.aggregate_id == event.aggregate_id()
                        && row.sequence_number == event.sequence_number()
                });
                if taken {
                    return Err(EventStoreError::SequenceConflict {
                        aggregate_id: event.aggregate_id(),
                        sequence_number: event.sequence_number(),
                    });
                }
            }

            let mut next_id = rows.len() as i64 + 1;
            for event in events {
                rows.push(StoredEvent {
                    id: next_id,
                    aggregate_id: event.aggregate_id(),
                    sequence_number: event.sequence_number(),
                    command_id: command.id(),
                    event_type: event.type_name().to_string(),
                    event_json: serialize_event(event),
                    created_at: event.created_at(),
                });
                next_id += 1;
            }
            self.commands.write().await.push(command.clone());
        }

        fan_out(&self.handlers, events).await
    }

    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<Event>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<_> = rows
            .iter()
            .filter(|row| row.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        matching.sort_by_key(|row| row.sequence_number);
        matching
            .iter()
            .map(|row| row.decode(&self.registry).map_err(EventStoreError::from))
            .collect()
    }

    async fn replay_events(&self, mut stream: RawEventStream<'_>) -> Result<u64> {
        let mut dispatched = 0;
        while let Some(row) = stream.next().await {
            let event = row?.decode(&self.registry)?;
            fan_out(&self.handlers, std::slice::from_ref(&event)).await?;
            dispatched += 1;
        }
        Ok(dispatched)
    }
}
