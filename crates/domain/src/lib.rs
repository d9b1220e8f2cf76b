//! Domain layer for the event-sourcing core.
//!
//! This crate provides:
//! - [`Aggregate`]: the per-type contract declaring the blank state and the
//!   event-variant → handler table
//! - [`AggregateRoot`]: the generic root owning id, sequence number and
//!   uncommitted events, with `apply` / `load_from_history` semantics
//! - [`AggregateRepository`]: the per-command identity map with
//!   write-through commit to the event store

pub mod aggregate;
pub mod error;
pub mod repository;

pub use aggregate::{Aggregate, AggregateRoot, Handler};
pub use error::{AggregateError, RepositoryError};
pub use repository::AggregateRepository;
