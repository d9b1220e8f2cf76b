//! The typed attribute tree carried by events and value objects.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;

/// Ordered attribute map; the payload of an event or value object.
///
/// A `BTreeMap` keeps serialization output stable regardless of insertion
/// order.
pub type Attributes = BTreeMap<String, Value>;

/// A typed attribute value.
///
/// Equality is structural. `Symbol` is the enum-like interned-string kind:
/// it serializes as a plain string and deserializes back to a `Symbol`
/// under a `Symbol`-declared field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Bool(bool),
    Symbol(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Record(Attributes),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Attributes> {
        match self {
            Value::Record(attrs) => Some(attrs),
            _ => None,
        }
    }

    /// The canonical string form used for index keys and where-clause
    /// comparison. `Text` and `Symbol` share the same form so an interned
    /// value and its string spelling hit the same index bucket.
    pub fn key_form(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) | Value::Symbol(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Date(d) => d.format("%d-%m-%Y").to_string(),
            Value::Timestamp(t) => t.to_rfc3339(),
            Value::List(_) | Value::Record(_) => self.to_json().to_string(),
        }
    }

    /// Schema-less JSON encoding: dates as `DD-MM-YYYY`, timestamps as
    /// ISO 8601, symbols as plain strings, nested records as objects.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Text(s) | Value::Symbol(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Date(d) => serde_json::Value::String(d.format("%d-%m-%Y").to_string()),
            Value::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(attrs) => serde_json::Value::Object(
                attrs
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<AggregateId> for Value {
    fn from(id: AggregateId) -> Self {
        Value::Text(id.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
