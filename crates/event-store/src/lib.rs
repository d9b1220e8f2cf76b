//! Durable append-only event log for the event-sourcing core.
//!
//! This crate provides:
//! - [`Command`]: the originating command persisted alongside its events
//! - [`StoredEvent`]: the raw event row as it lives in the `events` table
//! - [`EventStore`]: the store contract — transactional append with handler
//!   fan-out, per-aggregate ordered load, and bulk replay from a supplied
//!   row stream
//! - [`EventHandler`]: the `handle_message` interface read models implement
//! - [`PostgresEventStore`]: the durable implementation
//! - [`InMemoryEventStore`]: the same contract for unit tests

pub mod command;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod stored;

pub use command::Command;
pub use common::{AggregateId, CommandId, SequenceNumber};
pub use error::{EventStoreError, Result};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{EventHandler, EventStore, HandlerResult, RawEventStream, ReplayOrder};
pub use stored::StoredEvent;
