//! Static schema descriptors for events and value objects.

use std::collections::HashMap;

/// How a declared field participates in serialization and equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Serialized and part of the `payload()` projection.
    Payload,
    /// Serialized but excluded from `payload()` and equality, such as a
    /// tenant-scoping `organization_id`.
    Scoping,
    /// Validation-support field; never serialized, never compared.
    Transient,
}

/// Declared type of a field, driving coercion at deserialize time.
#[derive(Debug)]
pub enum FieldKind {
    /// UTF-8 string; blank input coerces to null.
    Text,
    /// 64-bit integer; base-10 strings are parsed.
    Integer,
    /// Boolean; the strings `"true"` and `"false"` are accepted.
    Bool,
    /// Enum-like interned string, serialized as its plain string form.
    Symbol,
    /// Calendar date, strictly `DD-MM-YYYY` on the wire.
    Date,
    /// Point in time, strictly ISO 8601 on the wire.
    Timestamp,
    /// Homogeneous list; elements coerce through the inner kind and null
    /// elements are preserved.
    List(&'static FieldKind),
    /// Nested value object deserialized through its own schema.
    Object(&'static ValueSchema),
}

/// A declared field of an event or value object.
#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub role: FieldRole,
}

impl Field {
    /// Declares a payload field.
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            role: FieldRole::Payload,
        }
    }

    /// Declares a scoping field: serialized, but outside `payload()`.
    pub const fn scoping(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            role: FieldRole::Scoping,
        }
    }

    /// Declares a transient field: stripped from every serialized form.
    pub const fn transient(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            role: FieldRole::Transient,
        }
    }
}

/// Schema of a nested value object.
#[derive(Debug)]
pub struct ValueSchema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

/// Descriptor of one event variant: its stable wire name and payload schema.
#[derive(Debug)]
pub struct EventType {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl EventType {
    /// Looks up a declared field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Registry mapping `event_type` wire names to their descriptors.
///
/// Deserialization of a stored event starts here; an unregistered name
/// fails with [`SerializationError::UnknownEventType`].
///
/// [`SerializationError::UnknownEventType`]: crate::SerializationError::UnknownEventType
#[derive(Debug, Default)]
pub struct EventTypeRegistry {
    types: HashMap<&'static str, &'static EventType>,
}

impl EventTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from a list of descriptors.
    pub fn with(types: &[&'static EventType]) -> Self {
        let mut registry = Self::new();
        for ty in types {
            registry.register(ty);
        }
        registry
    }

    /// Registers an event type. Re-registering the same name replaces the
    /// previous descriptor.
    pub fn register(&mut self, event_type: &'static EventType) {
        self.types.insert(event_type.name, event_type);
    }

    /// Looks up a descriptor by wire name.
    pub fn get(&self, name: &str) -> Option<&'static EventType> {
        self.types.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SHIPPED: EventType = EventType {
        name: "ParcelShipped",
        fields: &[
            Field::new("carrier", FieldKind::Text),
            Field::scoping("organization_id", FieldKind::Text),
        ],
    };

    #[test]
    fn registry_lookup_by_wire_name() {
        let registry = EventTypeRegistry::with(&[&SHIPPED]);
        assert!(registry.get("ParcelShipped").is_some());
        assert!(registry.get("ParcelLost").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn field_lookup() {
        assert_eq!(SHIPPED.field("carrier").map(|f| f.role), Some(FieldRole::Payload));
        assert_eq!(
            SHIPPED.field("organization_id").map(|f| f.role),
            Some(FieldRole::Scoping)
        );
        assert!(SHIPPED.field("missing").is_none());
    }
}
