//! Process-wide wiring for the event-sourcing core.
//!
//! This crate provides:
//! - [`CoreConfig`]: the context object bundling the event store, the
//!   event-type registry and the repository factory
//! - [`configure`] / [`current`]: the single accessor behind which the
//!   process-wide configuration lives; reconfiguration swaps the whole
//!   instance atomically
//! - [`CommandService`]: one command scope — fresh repository, handler,
//!   commit
//! - [`telemetry`]: default tracing and metrics installation

pub mod config;
pub mod service;
pub mod telemetry;

pub use config::{CoreConfig, Settings, configure, current, try_current};
pub use service::CommandService;
