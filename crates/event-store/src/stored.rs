//! Raw event rows and their decoding.

use chrono::{DateTime, Utc};
use common::{AggregateId, CommandId, SequenceNumber};
use model::{Event, EventTypeRegistry, SerializationError, deserialize_as};
use serde::{Deserialize, Serialize};

/// An event row as persisted in the `events` table.
///
/// `event_json` is the self-describing serialized form; the envelope columns
/// are denormalized copies used for ordering and uniqueness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub aggregate_id: AggregateId,
    pub sequence_number: SequenceNumber,
    pub command_id: CommandId,
    pub event_type: String,
    pub event_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Decodes the row into a typed event: the variant is resolved through
    /// the registry by the `event_type` column, then `event_json` is
    /// deserialized against that descriptor.
    pub fn decode(&self, registry: &EventTypeRegistry) -> Result<Event, SerializationError> {
        let event_type = registry
            .get(&self.event_type)
            .ok_or_else(|| SerializationError::UnknownEventType(self.event_type.clone()))?;
        deserialize_as(event_type, &self.event_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{EventType, Field, FieldKind, serialize_event};
    use model::{Attributes, Value};

    static NAMED: EventType = EventType {
        name: "ThingNamed",
        fields: &[Field::new("name", FieldKind::Text)],
    };

    fn stored(event: &Event) -> StoredEvent {
        StoredEvent {
            id: 1,
            aggregate_id: event.aggregate_id(),
            sequence_number: event.sequence_number(),
            command_id: CommandId::new(),
            event_type: event.type_name().to_string(),
            event_json: serialize_event(event),
            created_at: event.created_at(),
        }
    }

    #[test]
    fn decode_round_trips_the_event() {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), Value::from("widget"));
        let event = Event::new(
            &NAMED,
            AggregateId::new(),
            SequenceNumber::first(),
            Utc::now(),
            attributes,
        );

        let registry = EventTypeRegistry::with(&[&NAMED]);
        let decoded = stored(&event).decode(&registry).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.aggregate_id(), event.aggregate_id());
    }

    #[test]
    fn decode_fails_for_unregistered_type() {
        let event = Event::new(
            &NAMED,
            AggregateId::new(),
            SequenceNumber::first(),
            Utc::now(),
            Attributes::new(),
        );
        let registry = EventTypeRegistry::new();
        assert!(matches!(
            stored(&event).decode(&registry),
            Err(SerializationError::UnknownEventType(_))
        ));
    }
}
