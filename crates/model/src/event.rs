//! Immutable event instances.

use chrono::{DateTime, Utc};
use common::{AggregateId, SequenceNumber};

use crate::schema::{EventType, FieldRole};
use crate::value::{Attributes, Value};

static NULL: Value = Value::Null;

/// An immutable fact about an aggregate.
///
/// Carries the mandatory envelope (`aggregate_id`, `sequence_number`,
/// `created_at`, the variant descriptor) plus the payload attributes the
/// variant declares. Equality compares the [`payload`](Event::payload)
/// projection, so two deserialized events with the same serialized payload
/// are equal regardless of how they were produced.
#[derive(Debug, Clone)]
pub struct Event {
    event_type: &'static EventType,
    aggregate_id: AggregateId,
    sequence_number: SequenceNumber,
    created_at: DateTime<Utc>,
    attributes: Attributes,
}

impl Event {
    /// Builds an event. `attributes` holds the payload fields; absent
    /// declared fields read as null.
    pub fn new(
        event_type: &'static EventType,
        aggregate_id: AggregateId,
        sequence_number: SequenceNumber,
        created_at: DateTime<Utc>,
        attributes: Attributes,
    ) -> Self {
        Self {
            event_type,
            aggregate_id,
            sequence_number,
            created_at,
            attributes,
        }
    }

    pub fn event_type(&self) -> &'static EventType {
        self.event_type
    }

    /// The stable wire name of the variant.
    pub fn type_name(&self) -> &'static str {
        self.event_type.name
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn sequence_number(&self) -> SequenceNumber {
        self.sequence_number
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The raw attribute map as stored; null fields may be absent.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Reads one attribute, returning null when the field is absent.
    pub fn get(&self, name: &str) -> &Value {
        self.attributes.get(name).unwrap_or(&NULL)
    }

    /// The payload projection: every declared payload field (null-filled
    /// when unset) plus `event_type`. Scoping and transient fields are
    /// excluded, as are the envelope fields.
    pub fn payload(&self) -> Attributes {
        let mut payload = Attributes::new();
        for field in self.event_type.fields {
            if field.role == FieldRole::Payload {
                payload.insert(field.name.to_string(), self.get(field.name).clone());
            }
        }
        payload.insert(
            "event_type".to_string(),
            Value::Text(self.event_type.name.to_string()),
        );
        payload
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.payload() == other.payload()
    }
}
