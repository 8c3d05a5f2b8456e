/// Errors returned when a reference expression cannot be resolved against a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The expression itself is not a valid reference.
    #[error("invalid reference '{expr}': {reason}")]
    Malformed { expr: String, reason: String },

    /// The view the expression addresses does not exist in this record
    /// (e.g. a field under `.Payload.After` when the record has no after payload).
    #[error("reference '{expr}': record has no {container}")]
    MissingContainer {
        expr: String,
        container: &'static str,
    },

    /// The record exists but its shape does not match the expression, e.g.
    /// a field path into raw (unstructured) data.
    #[error("reference '{expr}': {reason}")]
    ShapeMismatch { expr: String, reason: String },
}

/// Errors returned when writing through a resolved field reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetError {
    /// The location is part of the record identity and cannot be written.
    #[error("field {field} is read-only")]
    ReadOnly { field: String },

    /// The supplied value cannot be stored at this location.
    #[error("field {field} expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
}
