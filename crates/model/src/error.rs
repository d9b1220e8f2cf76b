//! Serialization error types.

use thiserror::Error;

/// Errors raised while converting between events and their JSON form.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// The `event_type` in a document is not in the registry.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The envelope is missing a mandatory field.
    #[error("event document missing {0}")]
    MissingEnvelopeField(&'static str),

    /// A JSON node has a shape the declared field kind cannot accept.
    #[error("field {field}: expected {expected}, found {found}")]
    UnexpectedShape {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// A string did not parse as a base-10 integer.
    #[error("field {field}: invalid integer literal {value:?}")]
    InvalidInteger { field: String, value: String },

    /// A string is neither `"true"` nor `"false"`.
    #[error("field {field}: invalid boolean literal {value:?}")]
    InvalidBoolean { field: String, value: String },

    /// A string did not parse as a strict `DD-MM-YYYY` date.
    #[error("field {field}: invalid date {value:?}, expected DD-MM-YYYY")]
    InvalidDate { field: String, value: String },

    /// A string did not parse as a strict ISO 8601 timestamp.
    #[error("field {field}: invalid timestamp {value:?}, expected ISO 8601")]
    InvalidTimestamp { field: String, value: String },

    /// The document itself is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for serializer operations.
pub type Result<T> = std::result::Result<T, SerializationError>;
