//! Symmetric conversion between events and JSON documents.
//!
//! Serialization walks the declared schema, so transient fields never reach
//! the wire. Deserialization coerces each JSON node through the declared
//! [`FieldKind`] of its field; for every scalar kind a blank string (empty
//! or whitespace-only) coerces to null.

use chrono::{DateTime, NaiveDate, Utc};
use common::{AggregateId, SequenceNumber};
use serde_json::Value as Json;

use crate::error::{Result, SerializationError};
use crate::event::Event;
use crate::schema::{EventType, EventTypeRegistry, Field, FieldKind, FieldRole};
use crate::value::{Attributes, Value};

/// Produces the self-describing JSON document for an event: the envelope
/// (`event_type`, `aggregate_id`, `sequence_number`, `created_at`) plus
/// every declared non-transient field, null-filled when unset.
pub fn serialize_event(event: &Event) -> Json {
    let mut doc = serde_json::Map::new();
    doc.insert("event_type".to_string(), Json::from(event.type_name()));
    doc.insert(
        "aggregate_id".to_string(),
        Json::from(event.aggregate_id().to_string()),
    );
    doc.insert(
        "sequence_number".to_string(),
        Json::from(event.sequence_number().as_i64()),
    );
    doc.insert(
        "created_at".to_string(),
        Json::from(event.created_at().to_rfc3339()),
    );
    for field in event.event_type().fields {
        if field.role == FieldRole::Transient {
            continue;
        }
        doc.insert(field.name.to_string(), encode(&field.kind, event.get(field.name)));
    }
    Json::Object(doc)
}

/// Deserializes an event document, resolving the variant through the
/// registry by its `event_type` name.
pub fn deserialize_event(registry: &EventTypeRegistry, doc: &Json) -> Result<Event> {
    let name = doc
        .get("event_type")
        .and_then(Json::as_str)
        .ok_or(SerializationError::MissingEnvelopeField("event_type"))?;
    let event_type = registry
        .get(name)
        .ok_or_else(|| SerializationError::UnknownEventType(name.to_string()))?;
    deserialize_as(event_type, doc)
}

/// Deserializes an event document against a known variant descriptor.
pub fn deserialize_as(event_type: &'static EventType, doc: &Json) -> Result<Event> {
    let Some(obj) = doc.as_object() else {
        return Err(SerializationError::UnexpectedShape {
            field: "$".to_string(),
            expected: "object",
            found: json_shape(doc).to_string(),
        });
    };

    let aggregate_id = obj
        .get("aggregate_id")
        .and_then(Json::as_str)
        .ok_or(SerializationError::MissingEnvelopeField("aggregate_id"))?
        .parse::<AggregateId>()
        .map_err(|_| SerializationError::UnexpectedShape {
            field: "aggregate_id".to_string(),
            expected: "UUID string",
            found: "malformed string".to_string(),
        })?;
    let sequence_number = obj
        .get("sequence_number")
        .and_then(Json::as_i64)
        .map(SequenceNumber::new)
        .ok_or(SerializationError::MissingEnvelopeField("sequence_number"))?;
    let created_at = obj
        .get("created_at")
        .and_then(Json::as_str)
        .ok_or(SerializationError::MissingEnvelopeField("created_at"))?;
    let created_at = parse_timestamp(created_at)
        .ok_or_else(|| SerializationError::InvalidTimestamp {
            field: "created_at".to_string(),
            value: created_at.to_string(),
        })?;

    let mut attributes = Attributes::new();
    for field in event_type.fields {
        if field.role == FieldRole::Transient {
            continue;
        }
        if let Some(raw) = obj.get(field.name) {
            let value = coerce_field(field, raw)?;
            if !value.is_null() {
                attributes.insert(field.name.to_string(), value);
            }
        }
    }

    Ok(Event::new(
        event_type,
        aggregate_id,
        sequence_number,
        created_at,
        attributes,
    ))
}

/// Coerces one JSON node through a declared field kind.
///
/// `field` names the attribute in error messages; nested coercion extends
/// it with a path.
pub fn coerce(kind: &FieldKind, raw: &Json, field: &str) -> Result<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    match kind {
        FieldKind::Text => match raw {
            Json::String(s) if is_blank(s) => Ok(Value::Null),
            Json::String(s) => Ok(Value::Text(s.clone())),
            other => Err(shape_error(field, "string", other)),
        },
        FieldKind::Integer => match raw {
            Json::Number(n) => n
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| SerializationError::InvalidInteger {
                    field: field.to_string(),
                    value: n.to_string(),
                }),
            Json::String(s) if is_blank(s) => Ok(Value::Null),
            Json::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| SerializationError::InvalidInteger {
                    field: field.to_string(),
                    value: s.clone(),
                }),
            other => Err(shape_error(field, "integer", other)),
        },
        FieldKind::Bool => match raw {
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::String(s) if is_blank(s) => Ok(Value::Null),
            Json::String(s) => match s.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(SerializationError::InvalidBoolean {
                    field: field.to_string(),
                    value: s.clone(),
                }),
            },
            other => Err(shape_error(field, "boolean", other)),
        },
        FieldKind::Symbol => match raw {
            Json::String(s) if is_blank(s) => Ok(Value::Null),
            Json::String(s) => Ok(Value::Symbol(s.clone())),
            other => Err(shape_error(field, "string", other)),
        },
        FieldKind::Date => match raw {
            Json::String(s) if is_blank(s) => Ok(Value::Null),
            Json::String(s) => NaiveDate::parse_from_str(s.trim(), "%d-%m-%Y")
                .map(Value::Date)
                .map_err(|_| SerializationError::InvalidDate {
                    field: field.to_string(),
                    value: s.clone(),
                }),
            other => Err(shape_error(field, "DD-MM-YYYY string", other)),
        },
        FieldKind::Timestamp => match raw {
            Json::String(s) if is_blank(s) => Ok(Value::Null),
            Json::String(s) => {
                parse_timestamp(s).map(Value::Timestamp).ok_or_else(|| {
                    SerializationError::InvalidTimestamp {
                        field: field.to_string(),
                        value: s.clone(),
                    }
                })
            }
            other => Err(shape_error(field, "ISO 8601 string", other)),
        },
        FieldKind::List(element) => match raw {
            Json::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    values.push(coerce(element, item, &format!("{field}[{index}]"))?);
                }
                Ok(Value::List(values))
            }
            other => Err(shape_error(field, "array", other)),
        },
        FieldKind::Object(schema) => match raw {
            Json::Object(obj) => {
                let mut attributes = Attributes::new();
                for nested in schema.fields {
                    if nested.role == FieldRole::Transient {
                        continue;
                    }
                    if let Some(node) = obj.get(nested.name) {
                        let value = coerce(&nested.kind, node, &format!("{field}.{}", nested.name))?;
                        if !value.is_null() {
                            attributes.insert(nested.name.to_string(), value);
                        }
                    }
                }
                Ok(Value::Record(attributes))
            }
            other => Err(shape_error(field, "object", other)),
        },
    }
}

fn coerce_field(field: &Field, raw: &Json) -> Result<Value> {
    coerce(&field.kind, raw, field.name)
}

fn encode(kind: &FieldKind, value: &Value) -> Json {
    match (kind, value) {
        (_, Value::Null) => Json::Null,
        (FieldKind::Object(schema), Value::Record(attrs)) => {
            let mut obj = serde_json::Map::new();
            for field in schema.fields {
                if field.role == FieldRole::Transient {
                    continue;
                }
                let cell = attrs.get(field.name).unwrap_or(&Value::Null);
                obj.insert(field.name.to_string(), encode(&field.kind, cell));
            }
            Json::Object(obj)
        }
        (FieldKind::List(element), Value::List(items)) => {
            Json::Array(items.iter().map(|item| encode(element, item)).collect())
        }
        (_, other) => other.to_json(),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn shape_error(field: &str, expected: &'static str, found: &Json) -> SerializationError {
    SerializationError::UnexpectedShape {
        field: field.to_string(),
        expected,
        found: json_shape(found).to_string(),
    }
}

fn json_shape(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
