//! Identifier types shared across the write side and the read side.
//!
//! All three are thin newtypes. They exist so a function signature can say
//! which stream, command or position it means instead of taking bare UUIDs
//! and integers, and so serde writes them in their bare wire form
//! (`#[serde(transparent)]`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one aggregate, and with it one event stream.
///
/// Every event carries the id of the aggregate that emitted it; the event
/// store keys its per-stream ordering and uniqueness on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

/// Identity of one command, linking every event row back to what caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

/// Position of an event within its aggregate's stream.
///
/// Positions are 1-based; a persisted stream is always `1..N` with no gaps
/// and no duplicates. An in-memory aggregate holds the *next* position it
/// will assign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceNumber(i64);

impl AggregateId {
    /// A fresh random identity for a new aggregate.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an identity read back from storage.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl CommandId {
    /// A fresh random identity for a new command.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an identity read back from storage.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl SequenceNumber {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Where every stream starts.
    pub fn first() -> Self {
        Self(1)
    }

    /// The position following this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// Event documents carry aggregate ids as strings; deserialization parses
// them back through this.
impl std::str::FromStr for AggregateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
