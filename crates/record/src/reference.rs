//! Field references into a [`Record`].
//!
//! A reference expression names one location in a record:
//!
//! - `.Position`, `.Operation` (read-only)
//! - `.Metadata` or `.Metadata.<key>`
//! - `.Key`, `.Payload.Before`, `.Payload.After`, optionally followed by
//!   nested field segments
//!
//! Segments are written `.name` (`[A-Za-z0-9_-]+`) or `["any text"]` for keys
//! containing dots or spaces. An expression without a leading `.` is
//! shorthand for a field under `.Payload.After`, so `text` and
//! `.Payload.After.text` are the same reference.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::{ResolveError, SetError};
use crate::record::{Data, Record};
use crate::value::{json_kind, FieldValue};

/// The part of the record a reference is anchored at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    Position,
    Operation,
    Metadata,
    Key,
    Before,
    After,
}

impl Root {
    fn container(&self) -> &'static str {
        match self {
            Root::Position => "position",
            Root::Operation => "operation",
            Root::Metadata => "metadata",
            Root::Key => "key",
            Root::Before => "before payload",
            Root::After => "after payload",
        }
    }
}

/// A parsed reference expression.
///
/// Parsing is independent of any record; [`FieldPath::resolve`] binds the
/// path to one record instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    expr: String,
    root: Root,
    fields: Vec<String>,
}

impl FieldPath {
    pub fn parse(expr: &str) -> Result<Self, ResolveError> {
        let expr = expr.trim();
        let malformed = |reason: String| ResolveError::Malformed {
            expr: expr.to_string(),
            reason,
        };

        if expr.is_empty() {
            return Err(malformed("empty reference".to_string()));
        }

        if !expr.starts_with('.') {
            let segments = if expr.starts_with('[') {
                parse_segments(expr)
            } else {
                parse_segments(&format!(".{expr}"))
            }
            .map_err(malformed)?;
            return Ok(FieldPath {
                expr: expr.to_string(),
                root: Root::After,
                fields: segments,
            });
        }

        let mut segments = parse_segments(expr).map_err(malformed)?.into_iter();
        let head = segments.next().unwrap_or_default();
        let (root, fields): (Root, Vec<String>) = match head.as_str() {
            "Position" => (Root::Position, segments.collect()),
            "Operation" => (Root::Operation, segments.collect()),
            "Metadata" => (Root::Metadata, segments.collect()),
            "Key" => (Root::Key, segments.collect()),
            "Payload" => match segments.next().as_deref() {
                Some("Before") => (Root::Before, segments.collect()),
                Some("After") => (Root::After, segments.collect()),
                Some(other) => {
                    return Err(malformed(format!(
                        "unknown payload view '{other}', expected Before or After"
                    )))
                }
                None => {
                    return Err(malformed(
                        "payload reference must name Before or After".to_string(),
                    ))
                }
            },
            other => return Err(malformed(format!("unknown root '{other}'"))),
        };

        match root {
            Root::Position | Root::Operation if !fields.is_empty() => {
                return Err(malformed(format!(
                    "{} has no fields",
                    root.container()
                )));
            }
            Root::Metadata if fields.len() > 1 => {
                return Err(malformed("metadata is not nested".to_string()));
            }
            _ => {}
        }

        Ok(FieldPath {
            expr: expr.to_string(),
            root,
            fields,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn root(&self) -> Root {
        self.root
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Bind this path to `record`, checking that the addressed container
    /// exists and has a compatible shape.
    pub fn resolve<'a>(&'a self, record: &'a mut Record) -> Result<FieldRef<'a>, ResolveError> {
        self.check(record)?;
        Ok(FieldRef {
            path: Cow::Borrowed(self),
            record,
        })
    }

    /// Resolve against `record` and read the current value without taking a
    /// mutable borrow.
    pub fn get(&self, record: &Record) -> Result<FieldValue, ResolveError> {
        self.check(record)?;
        Ok(self.read(record))
    }

    fn check(&self, record: &Record) -> Result<(), ResolveError> {
        if self.fields.is_empty() {
            return Ok(());
        }
        let data = match self.root {
            Root::Position | Root::Operation | Root::Metadata => return Ok(()),
            Root::Key => record.key.as_ref(),
            Root::Before => record.payload.before.as_ref(),
            Root::After => record.payload.after.as_ref(),
        };
        let data = data.ok_or_else(|| ResolveError::MissingContainer {
            expr: self.expr.clone(),
            container: self.root.container(),
        })?;

        let Data::Structured(map) = data else {
            return Err(ResolveError::ShapeMismatch {
                expr: self.expr.clone(),
                reason: format!("{} is raw data and has no fields", self.root.container()),
            });
        };

        let mut current = map;
        for name in &self.fields[..self.fields.len() - 1] {
            match current.get(name) {
                None => break,
                Some(Value::Object(next)) => current = next,
                Some(other) => {
                    return Err(ResolveError::ShapeMismatch {
                        expr: self.expr.clone(),
                        reason: format!("'{}' is {}, not an object", name, json_kind(other)),
                    })
                }
            }
        }
        Ok(())
    }

    fn read(&self, record: &Record) -> FieldValue {
        match self.root {
            Root::Position => FieldValue::Bytes(record.position.clone()),
            Root::Operation => FieldValue::Json(Value::String(record.operation.as_str().into())),
            Root::Metadata => match self.fields.first() {
                Some(key) => FieldValue::Json(
                    record
                        .metadata
                        .get(key)
                        .map(|v| Value::String(v.clone()))
                        .unwrap_or(Value::Null),
                ),
                None => FieldValue::Json(Value::Object(
                    record
                        .metadata
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect(),
                )),
            },
            Root::Key | Root::Before | Root::After => {
                let data = match self.root {
                    Root::Key => record.key.as_ref(),
                    Root::Before => record.payload.before.as_ref(),
                    _ => record.payload.after.as_ref(),
                };
                match (data, self.fields.is_empty()) {
                    (None, _) => FieldValue::Json(Value::Null),
                    (Some(Data::Raw(raw)), true) => FieldValue::Bytes(raw.clone()),
                    (Some(Data::Raw(_)), false) => FieldValue::Json(Value::Null),
                    (Some(Data::Structured(map)), true) => {
                        FieldValue::Json(Value::Object(map.clone()))
                    }
                    (Some(Data::Structured(map)), false) => {
                        FieldValue::Json(lookup(map, &self.fields).cloned().unwrap_or(Value::Null))
                    }
                }
            }
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl FromStr for FieldPath {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldPath::parse(s)
    }
}

/// Parse `expr` and resolve it against `record` in one step.
pub fn resolve<'a>(expr: &str, record: &'a mut Record) -> Result<FieldRef<'a>, ResolveError> {
    let path = FieldPath::parse(expr)?;
    path.check(record)?;
    Ok(FieldRef {
        path: Cow::Owned(path),
        record,
    })
}

/// A field reference bound to one record.
///
/// The handle holds the record's mutable borrow, so it cannot be kept past
/// the record or reused for another one.
#[derive(Debug)]
pub struct FieldRef<'a> {
    path: Cow<'a, FieldPath>,
    record: &'a mut Record,
}

impl FieldRef<'_> {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// The current value. A field that does not exist yet reads as JSON null.
    pub fn get(&self) -> FieldValue {
        self.path.read(self.record)
    }

    /// Write `value` into the referenced location, creating intermediate
    /// objects as needed.
    pub fn set(&mut self, value: impl Into<FieldValue>) -> Result<(), SetError> {
        let value = value.into();
        let path: &FieldPath = &self.path;
        let field = path.expr.clone();

        match path.root {
            Root::Position | Root::Operation => Err(SetError::ReadOnly { field }),
            Root::Metadata => set_metadata(self.record, path.fields.first(), value, field),
            Root::Key | Root::Before | Root::After => {
                let slot = match path.root {
                    Root::Key => &mut self.record.key,
                    Root::Before => &mut self.record.payload.before,
                    _ => &mut self.record.payload.after,
                };
                if path.fields.is_empty() {
                    *slot = data_from_value(value, field)?;
                    return Ok(());
                }
                match slot {
                    Some(Data::Structured(map)) => {
                        set_nested(map, &path.fields, value.into_json(), field)
                    }
                    other => Err(SetError::TypeMismatch {
                        field,
                        expected: "structured data",
                        found: other.as_ref().map(Data::kind).unwrap_or("nothing"),
                    }),
                }
            }
        }
    }
}

fn lookup<'m>(map: &'m Map<String, Value>, fields: &[String]) -> Option<&'m Value> {
    let (first, rest) = fields.split_first()?;
    let mut current = map.get(first)?;
    for name in rest {
        current = current.as_object()?.get(name)?;
    }
    Some(current)
}

fn set_nested(
    map: &mut Map<String, Value>,
    fields: &[String],
    value: Value,
    field: String,
) -> Result<(), SetError> {
    let Some((last, parents)) = fields.split_last() else {
        return Ok(());
    };
    let mut current = map;
    for name in parents {
        let entry = current
            .entry(name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(next) => next,
            other => {
                return Err(SetError::TypeMismatch {
                    field,
                    expected: "object",
                    found: json_kind(other),
                })
            }
        };
    }
    current.insert(last.clone(), value);
    Ok(())
}

fn data_from_value(value: FieldValue, field: String) -> Result<Option<Data>, SetError> {
    match value {
        FieldValue::Bytes(bytes) => Ok(Some(Data::Raw(bytes))),
        FieldValue::Json(Value::Object(map)) => Ok(Some(Data::Structured(map))),
        FieldValue::Json(Value::String(text)) => Ok(Some(Data::Raw(text.into_bytes()))),
        FieldValue::Json(Value::Null) => Ok(None),
        other => Err(SetError::TypeMismatch {
            field,
            expected: "bytes, string, object or null",
            found: other.kind(),
        }),
    }
}

fn set_metadata(
    record: &mut Record,
    key: Option<&String>,
    value: FieldValue,
    field: String,
) -> Result<(), SetError> {
    let Some(key) = key else {
        let map = match value {
            FieldValue::Json(Value::Object(map)) => map,
            other => {
                return Err(SetError::TypeMismatch {
                    field,
                    expected: "object of strings",
                    found: other.kind(),
                })
            }
        };
        let mut metadata = crate::Metadata::new();
        for (k, v) in map {
            match v {
                Value::String(v) => {
                    metadata.insert(k, v);
                }
                other => {
                    return Err(SetError::TypeMismatch {
                        field,
                        expected: "object of strings",
                        found: json_kind(&other),
                    })
                }
            }
        }
        record.metadata = metadata;
        return Ok(());
    };

    match value {
        FieldValue::Json(Value::String(text)) => {
            record.metadata.insert(key.clone(), text);
            Ok(())
        }
        FieldValue::Json(Value::Null) => {
            record.metadata.remove(key);
            Ok(())
        }
        FieldValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => {
                record.metadata.insert(key.clone(), text);
                Ok(())
            }
            Err(_) => Err(SetError::TypeMismatch {
                field,
                expected: "string",
                found: "non-UTF-8 bytes",
            }),
        },
        other => Err(SetError::TypeMismatch {
            field,
            expected: "string",
            found: other.kind(),
        }),
    }
}

fn parse_segments(expr: &str) -> Result<Vec<String>, String> {
    let mut segments = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err("expected field name after '.'".to_string());
                }
                segments.push(name);
            }
            '[' => {
                if chars.next() != Some('"') {
                    return Err("expected '\"' after '['".to_string());
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => name.push(escaped),
                            _ => return Err("invalid escape in bracketed field".to_string()),
                        },
                        Some('"') => break,
                        Some(c) => name.push(c),
                        None => return Err("unterminated bracketed field".to_string()),
                    }
                }
                if chars.next() != Some(']') {
                    return Err("expected ']' after bracketed field".to_string());
                }
                segments.push(name);
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(segments)
}
