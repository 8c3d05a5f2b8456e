use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;

/// A value read from or written to a record field.
///
/// Opaque bytes and structured JSON are kept apart so the location they are
/// stored in decides the encoding: a structured field stores bytes as a base64
/// string, a payload root stores them as raw data.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bytes(Vec<u8>),
    Json(Value),
}

impl FieldValue {
    /// The on-wire representation: raw bytes as-is, JSON as compact text.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            FieldValue::Bytes(bytes) => bytes.clone(),
            FieldValue::Json(value) => value.to_string().into_bytes(),
        }
    }

    /// The JSON form of this value, as stored in a structured field.
    pub fn into_json(self) -> Value {
        match self {
            FieldValue::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
            FieldValue::Json(value) => value,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Json(Value::Null))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Json(value) => json_kind(value),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Json(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(bytes: Vec<u8>) -> Self {
        FieldValue::Bytes(bytes)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
