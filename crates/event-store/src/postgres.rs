use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use model::{Event, EventTypeRegistry, serialize_event};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, Command, CommandId, EventStoreError, Result, SequenceNumber, StoredEvent,
    store::{EventHandler, EventStore, RawEventStream, ReplayOrder, fan_out, validate_events_for_commit},
};

/// PostgreSQL-backed event store implementation.
///
/// The handler set and event-type registry are fixed at construction;
/// reconfiguration allocates a fresh instance.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
    registry: Arc<EventTypeRegistry>,
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl PostgresEventStore {
    /// Creates a store with no handlers.
    pub fn new(pool: PgPool, registry: Arc<EventTypeRegistry>) -> Self {
        Self::with_handlers(pool, registry, Vec::new())
    }

    /// Creates a store with the given handler set.
    pub fn with_handlers(
        pool: PgPool,
        registry: Arc<EventTypeRegistry>,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) -> Self {
        Self {
            pool,
            registry,
            handlers,
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Produces a replay stream over the full log in the given order.
    pub fn stream_events(&self, order: ReplayOrder) -> RawEventStream<'_> {
        let sql = match order {
            ReplayOrder::Insertion => {
                "SELECT id, aggregate_id, sequence_number, command_id, event_type, event_json, created_at \
                 FROM events ORDER BY id ASC"
            }
            ReplayOrder::PerAggregate => {
                "SELECT id, aggregate_id, sequence_number, command_id, event_type, event_json, created_at \
                 FROM events ORDER BY aggregate_id ASC, sequence_number ASC"
            }
        };

        let stream = sqlx::query(sql).fetch(&self.pool).map(|result| match result {
            Ok(row) => Self::row_to_stored(row),
            Err(e) => Err(EventStoreError::Database(e)),
        });

        Box::pin(stream)
    }

    fn row_to_stored(row: PgRow) -> Result<StoredEvent> {
        Ok(StoredEvent {
            id: row.try_get("id")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            sequence_number: SequenceNumber::new(row.try_get("sequence_number")?),
            command_id: CommandId::from_uuid(row.try_get::<Uuid, _>("command_id")?),
            event_type: row.try_get("event_type")?,
            event_json: row.try_get("event_json")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, command, events), fields(command_type = command.command_type(), event_count = events.len()))]
    async fn commit_events(&self, command: &Command, events: &[Event]) -> Result<()> {
        validate_events_for_commit(events)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO commands (id, command_type, command_json, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(command.id().as_uuid())
        .bind(command.command_type())
        .bind(command.payload())
        .bind(command.created_at())
        .execute(&mut *tx)
        .await?;

        for event in events {
            sqlx::query(
                r#"
                INSERT INTO events (aggregate_id, sequence_number, command_id, event_type, event_json, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(event.aggregate_id().as_uuid())
            .bind(event.sequence_number().as_i64())
            .bind(command.id().as_uuid())
            .bind(event.type_name())
            .bind(serialize_event(event))
            .bind(event.created_at())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_sequence")
                {
                    return EventStoreError::SequenceConflict {
                        aggregate_id: event.aggregate_id(),
                        sequence_number: event.sequence_number(),
                    };
                }
                EventStoreError::Database(e)
            })?;
        }

        tx.commit().await?;
        metrics::counter!("event_store_events_committed").increment(events.len() as u64);

        // The log is durable from here on; a handler failure surfaces to the
        // caller with persistence intact.
        fan_out(&self.handlers, events).await
    }

    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<Event>> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_id, sequence_number, command_id, event_type, event_json, created_at
            FROM events
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Self::row_to_stored(row)?
                    .decode(&self.registry)
                    .map_err(EventStoreError::from)
            })
            .collect()
    }

    #[tracing::instrument(skip(self, stream))]
    async fn replay_events(&self, mut stream: RawEventStream<'_>) -> Result<u64> {
        let mut dispatched = 0;
        while let Some(row) = stream.next().await {
            let event = row?.decode(&self.registry)?;
            fan_out(&self.handlers, std::slice::from_ref(&event)).await?;
            dispatched += 1;
            metrics::counter!("event_store_events_replayed").increment(1);
        }

        tracing::info!(events = dispatched, "replay complete");
        Ok(dispatched)
    }
}
