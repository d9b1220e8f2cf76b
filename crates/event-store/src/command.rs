//! The originating command persisted alongside its events.

use chrono::{DateTime, Utc};
use common::CommandId;
use serde::{Deserialize, Serialize};

/// A command as recorded in the `commands` table.
///
/// The event store does not interpret commands; it persists them so every
/// event row can point back at what caused it via `command_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    id: CommandId,
    command_type: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl Command {
    /// Creates a command with a fresh ID and the current time.
    pub fn new(command_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: CommandId::new(),
            command_type: command_type.into(),
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn command_type(&self) -> &str {
        &self.command_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
