//! Typed event and value-object model for the event-sourcing core.
//!
//! This crate provides:
//! - [`Value`] and [`Attributes`]: the typed attribute tree carried by events
//!   and value objects
//! - [`Field`], [`FieldKind`], [`ValueSchema`], [`EventType`]: static schema
//!   descriptors declaring the shape of each event variant
//! - [`EventTypeRegistry`]: the `event_type` name → descriptor lookup used at
//!   deserialization time
//! - [`Event`]: an immutable event instance with its payload projection
//! - The serializer: symmetric conversion between events and JSON documents,
//!   with per-kind scalar coercion

pub mod error;
pub mod event;
pub mod schema;
pub mod serializer;
pub mod value;

pub use error::{Result, SerializationError};
pub use event::Event;
pub use schema::{EventType, EventTypeRegistry, Field, FieldKind, FieldRole, ValueSchema};
pub use serializer::{coerce, deserialize_as, deserialize_event, serialize_event};
pub use value::{Attributes, Value};
