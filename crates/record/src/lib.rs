//! llm-embed-record: the change-event record model and field references.
//!
//! Records follow the OpenCDC shape (position, operation, metadata, key and
//! a before/after payload). A [`FieldPath`] is parsed once from a reference
//! expression such as `.Payload.After.text` and resolved against a record to
//! obtain a [`FieldRef`], a handle that reads and writes one location in
//! place.

mod error;
mod record;
pub mod reference;
mod value;

pub use error::{ResolveError, SetError};
pub use record::{Data, Metadata, Operation, Payload, Record};
pub use reference::{resolve, FieldPath, FieldRef, Root};
pub use value::FieldValue;
