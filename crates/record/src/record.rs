use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::value::json_kind;

/// Free-form string metadata attached to a record.
pub type Metadata = BTreeMap<String, String>;

/// The kind of change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Snapshot,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Snapshot => "snapshot",
        }
    }
}

/// The content of a key or payload view.
///
/// Serialized the OpenCDC way: raw data as a base64 string, structured data
/// as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Raw(Vec<u8>),
    Structured(Map<String, Value>),
}

impl Data {
    /// The on-wire bytes of this data: raw bytes as-is, structured data as
    /// compact JSON.
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Data::Raw(raw) => raw.clone(),
            Data::Structured(fields) => Value::Object(fields.clone()).to_string().into_bytes(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Data::Raw(_) => "raw data",
            Data::Structured(_) => "structured data",
        }
    }
}

impl Serialize for Data {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Data::Raw(raw) => serializer.serialize_str(&BASE64.encode(raw)),
            Data::Structured(fields) => fields.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Data {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(encoded) => BASE64
                .decode(encoded.as_bytes())
                .map(Data::Raw)
                .map_err(|e| de::Error::custom(format!("raw data is not valid base64: {e}"))),
            Value::Object(fields) => Ok(Data::Structured(fields)),
            other => Err(de::Error::custom(format!(
                "expected base64 string or object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

/// The before/after views of a change event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub before: Option<Data>,
    #[serde(default)]
    pub after: Option<Data>,
}

/// One change event flowing through the pipeline.
///
/// `position` and `operation` identify the record and are never written by
/// the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, with = "base64_bytes")]
    pub position: Vec<u8>,
    pub operation: Operation,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub key: Option<Data>,
    #[serde(default)]
    pub payload: Payload,
}

impl Record {
    /// Create an empty record at the given position.
    pub fn new(position: impl Into<Vec<u8>>, operation: Operation) -> Self {
        Record {
            position: position.into(),
            operation,
            metadata: Metadata::new(),
            key: None,
            payload: Payload::default(),
        }
    }

    pub fn with_key(mut self, key: Data) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_before(mut self, before: Data) -> Self {
        self.payload.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: Data) -> Self {
        self.payload.after = Some(after);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?;
        match encoded {
            Some(encoded) => BASE64.decode(encoded.as_bytes()).map_err(de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
