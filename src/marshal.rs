//! Write payloads into store documents.
//!
//! Three input shapes, each with its own entry point:
//! - a serializable record, whose fields go through type inference ([`from_record`]);
//! - a ready-made mapping, passed through untouched ([`from_mapping`]);
//! - a sequence of records, each converted as-is ([`from_sequence`]).
//!
//! `ID`, `_id` and `id` all become `_id`. With `include_id == false` that key is dropped.

use bson::oid::ObjectId;
use bson::{Bson, Document};
use chrono::DateTime;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::DbError;

pub const ID_KEY: &str = "_id";

/// Hex length of an object id; its quoted JSON form is two characters longer.
const OBJECT_ID_HEX_LEN: usize = 24;

/// A write payload in one of the supported shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Record(Value),
    Mapping(Document),
    Sequence(Vec<Document>),
}

impl Payload {
    /// # Errors
    /// Fails if the record cannot be serialized.
    pub fn record<T: Serialize + ?Sized>(record: &T) -> Result<Self, DbError> {
        Ok(Self::Record(serde_json::to_value(record)?))
    }

    #[must_use]
    pub const fn mapping(doc: Document) -> Self {
        Self::Mapping(doc)
    }

    /// # Errors
    /// Fails if an element does not serialize to a document.
    pub fn sequence<T: Serialize>(items: &[T]) -> Result<Self, DbError> {
        items
            .iter()
            .map(|item| {
                let value = serde_json::to_value(item)?;
                json_object_to_document(value)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::Sequence)
    }
}

/// Marshaled form of a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Marshaled {
    One(Document),
    Many(Vec<Document>),
}

/// # Errors
/// Configuration errors for unsupported shapes or empty results.
pub fn marshal(payload: &Payload, include_id: bool) -> Result<Marshaled, DbError> {
    match payload {
        Payload::Record(v) => from_record(v, include_id).map(Marshaled::One),
        Payload::Mapping(d) => from_mapping(d, include_id).map(Marshaled::One),
        Payload::Sequence(items) => from_sequence(items).map(Marshaled::Many),
    }
}

/// Normalize identifier spellings to [`ID_KEY`].
#[must_use]
pub fn valid_id(key: &str) -> &str {
    match key {
        "ID" | "_id" | "id" => ID_KEY,
        other => other,
    }
}

/// # Errors
/// Fails when the record is not an object or yields no fields.
pub fn from_record(record: &Value, include_id: bool) -> Result<Document, DbError> {
    let Value::Object(fields) = record else {
        return Err(DbError::config("data argument must be a struct or map"));
    };
    let mut out = Document::new();
    for (k, v) in fields {
        let key = valid_id(k);
        if !include_id && key == ID_KEY {
            continue;
        }
        out.insert(key, infer(v));
    }
    non_empty(out)
}

/// # Errors
/// Fails when nothing is left after identifier handling.
pub fn from_mapping(mapping: &Document, include_id: bool) -> Result<Document, DbError> {
    let mut out = Document::new();
    for (k, v) in mapping {
        let key = valid_id(k);
        if !include_id && key == ID_KEY {
            continue;
        }
        out.insert(key, v.clone());
    }
    non_empty(out)
}

/// # Errors
/// Fails for an empty sequence.
pub fn from_sequence(items: &[Document]) -> Result<Vec<Document>, DbError> {
    if items.is_empty() {
        return Err(DbError::config("data argument can't be empty"));
    }
    Ok(items.to_vec())
}

fn non_empty(doc: Document) -> Result<Document, DbError> {
    if doc.is_empty() {
        return Err(DbError::config("data argument can't be empty"));
    }
    Ok(doc)
}

/// Integer, float, timestamp, object id, nested object, array, then passthrough.
fn infer(value: &Value) -> Bson {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else if let Some(f) = n.as_f64() {
                Bson::Double(f)
            } else {
                Bson::String(n.to_string())
            }
        }
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Bson::DateTime(bson::DateTime::from_millis(dt.timestamp_millis()));
            }
            if s.len() == OBJECT_ID_HEX_LEN
                && let Ok(oid) = ObjectId::parse_str(s)
            {
                return Bson::ObjectId(oid);
            }
            Bson::String(s.clone())
        }
        Value::Object(map) => Bson::Document(infer_object(map)),
        Value::Array(items) => Bson::Array(items.iter().map(infer).collect()),
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Null => Bson::Null,
    }
}

fn infer_object(map: &Map<String, Value>) -> Document {
    map.iter().map(|(k, v)| (valid_id(k).to_string(), infer(v))).collect()
}

fn json_object_to_document(value: Value) -> Result<Document, DbError> {
    let Value::Object(map) = value else {
        return Err(DbError::config("sequence elements must be structs or maps"));
    };
    Document::try_from(map).map_err(|e| DbError::config(format!("unsupported field value: {e}")))
}
