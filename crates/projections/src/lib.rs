//! Read-model staging for replay: the in-memory working set handlers write
//! into while events are replayed, flushed to Postgres in bulk.
//!
//! This crate provides:
//! - [`RecordClass`] / [`Column`]: static descriptors of read-model tables
//! - [`Record`]: a mutable staged row with identity-based hash and equality
//! - [`ReplaySession`]: the staged record set with composite indexes, the
//!   three-branch query path, and `commit` via Postgres `COPY` or per-row
//!   inserts
//! - [`SessionProjection`]: the [`EventHandler`] adapter feeding a shared
//!   session
//!
//! [`EventHandler`]: event_store::EventHandler

pub mod error;
pub mod flush;
pub mod projection;
pub mod record;
pub mod session;

pub use error::{Result, SessionError};
pub use projection::{SessionProjection, SharedSession};
pub use record::{Column, Record, RecordClass};
pub use session::{ReplaySession, UpdateOptions};
