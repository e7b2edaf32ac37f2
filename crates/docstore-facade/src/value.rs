//! Decoded values returned by the query endpoint.
//!
//! Responses use JSON with a handful of tagged objects for types JSON cannot
//! express: `{"@ref": ..}`, `{"@ts": ..}`, `{"@date": ..}`, `{"@bytes": ..}`,
//! `{"@set": ..}`, `{"@query": ..}`, and `{"@obj": ..}` for objects whose
//! keys would otherwise look like a tag.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Caller payload: a JSON object stored under a document's `data` field.
pub type Data = serde_json::Map<String, serde_json::Value>;

/// Id of the native collection that holds collection definitions.
const COLLECTIONS: &str = "collections";
/// Id of the native collection that holds index definitions.
const INDEXES: &str = "indexes";

/// Reference to a document, collection, index or other schema object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ref {
    /// Identifier within the parent collection.
    pub id: String,
    /// Parent collection; `None` for native collections.
    pub collection: Option<Box<Ref>>,
    /// Owning child database, if not the current one.
    pub database: Option<Box<Ref>>,
}

impl Ref {
    /// Reference to a native collection such as `collections` or `indexes`.
    pub fn native(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection: None,
            database: None,
        }
    }

    /// Reference to a user collection.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            id: name.into(),
            collection: Some(Box::new(Self::native(COLLECTIONS))),
            database: None,
        }
    }

    /// Reference to an index.
    pub fn index(name: impl Into<String>) -> Self {
        Self {
            id: name.into(),
            collection: Some(Box::new(Self::native(INDEXES))),
            database: None,
        }
    }

    /// Reference to a document in a user collection.
    pub fn document(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection: Some(Box::new(Self::collection(collection))),
            database: None,
        }
    }

    /// Name of the parent collection.
    #[must_use]
    pub fn collection_name(&self) -> Option<&str> {
        self.collection.as_deref().map(|c| c.id.as_str())
    }

    /// Returns true for native collections, which have no parent.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.collection.is_none()
    }

    /// Returns true if this refers to a user collection.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.collection
            .as_deref()
            .is_some_and(|c| c.is_native() && c.id == COLLECTIONS)
    }

    /// Returns true if this refers to an index.
    #[must_use]
    pub fn is_index(&self) -> bool {
        self.collection
            .as_deref()
            .is_some_and(|c| c.is_native() && c.id == INDEXES)
    }

    fn from_wire(inner: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(mut map) = inner else {
            return Err(Error::Decode("@ref payload is not an object".to_string()));
        };

        let id = match map.remove("id") {
            Some(serde_json::Value::String(id)) => id,
            _ => return Err(Error::Decode("@ref without string id".to_string())),
        };
        let collection = map.remove("collection").map(Self::nested).transpose()?;
        let database = map.remove("database").map(Self::nested).transpose()?;

        Ok(Self {
            id,
            collection,
            database,
        })
    }

    fn nested(raw: serde_json::Value) -> Result<Box<Self>> {
        match Value::from_wire(raw)? {
            Value::Ref(r) => Ok(Box::new(r)),
            other => Err(Error::Decode(format!(
                "expected nested @ref, got {}",
                other.type_name()
            ))),
        }
    }

    /// Renders the tagged wire form `{"@ref": {...}}`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut inner = serde_json::Map::new();
        inner.insert("id".to_string(), self.id.clone().into());
        if let Some(collection) = &self.collection {
            inner.insert("collection".to_string(), collection.to_json());
        }
        if let Some(database) = &self.database {
            inner.insert("database".to_string(), database.to_json());
        }
        serde_json::json!({ "@ref": inner })
    }
}

impl std::fmt::Display for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.collection_name() {
            Some(collection) => write!(f, "{collection}/{}", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// A value decoded from a query response.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer or floating point number.
    Number(serde_json::Number),
    /// String.
    String(String),
    /// Array.
    Array(Vec<Value>),
    /// Object, with `@obj` escaping already removed.
    Object(BTreeMap<String, Value>),
    /// Reference (`@ref`).
    Ref(Ref),
    /// ISO-8601 timestamp (`@ts`).
    Timestamp(String),
    /// ISO-8601 date (`@date`).
    Date(String),
    /// Raw bytes (`@bytes`).
    Bytes(Vec<u8>),
    /// Set expression, kept opaque (`@set`).
    Set(serde_json::Value),
    /// Lambda query, kept opaque (`@query`).
    Query(serde_json::Value),
}

impl Value {
    /// Decodes a wire value, resolving tagged objects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a tagged object carries a malformed payload.
    pub fn from_wire(raw: serde_json::Value) -> Result<Self> {
        match raw {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(b)),
            serde_json::Value::Number(n) => Ok(Self::Number(n)),
            serde_json::Value::String(s) => Ok(Self::String(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Self::from_wire)
                .collect::<Result<Vec<_>>>()
                .map(Self::Array),
            serde_json::Value::Object(map) => Self::from_wire_object(map),
        }
    }

    fn from_wire_object(mut map: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let tag = if map.len() == 1 {
            map.keys().next().filter(|k| k.starts_with('@')).cloned()
        } else {
            None
        };
        let Some(tag) = tag else {
            return Self::object_from_wire(map);
        };
        let inner = map.remove(&tag).unwrap_or_default();

        match tag.as_str() {
            "@ref" => Ref::from_wire(inner).map(Self::Ref),
            "@ts" => tagged_string(&tag, inner).map(Self::Timestamp),
            "@date" => tagged_string(&tag, inner).map(Self::Date),
            "@bytes" => {
                let encoded = tagged_string(&tag, inner)?;
                URL_SAFE
                    .decode(&encoded)
                    .or_else(|_| STANDARD.decode(&encoded))
                    .map(Self::Bytes)
                    .map_err(|e| Error::Decode(format!("invalid @bytes payload: {e}")))
            }
            "@set" => Ok(Self::Set(inner)),
            "@query" => Ok(Self::Query(inner)),
            "@obj" => match inner {
                serde_json::Value::Object(escaped) => Self::object_from_wire(escaped),
                _ => Err(Error::Decode("@obj payload is not an object".to_string())),
            },
            _ => {
                map.insert(tag, inner);
                Self::object_from_wire(map)
            }
        }
    }

    fn object_from_wire(map: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        map.into_iter()
            .map(|(k, v)| Self::from_wire(v).map(|v| (k, v)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(Self::Object)
    }

    /// Renders this value as JSON, using tagged objects for special types.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => items.iter().map(Self::to_json).collect(),
            Self::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Ref(r) => r.to_json(),
            Self::Timestamp(ts) => serde_json::json!({ "@ts": ts }),
            Self::Date(date) => serde_json::json!({ "@date": date }),
            Self::Bytes(bytes) => serde_json::json!({ "@bytes": URL_SAFE.encode(bytes) }),
            Self::Set(set) => serde_json::json!({ "@set": set }),
            Self::Query(query) => serde_json::json!({ "@query": query }),
        }
    }

    /// Name of the variant, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Ref(_) => "ref",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Bytes(_) => "bytes",
            Self::Set(_) => "set",
            Self::Query(_) => "query",
        }
    }

    /// Looks up a field of an object value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Returns the string content of a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is an integral number.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the elements of an array value.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the reference held by a ref value.
    #[must_use]
    pub fn as_reference(&self) -> Option<&Ref> {
        match self {
            Self::Ref(r) => Some(r),
            _ => None,
        }
    }
}

fn tagged_string(tag: &str, inner: serde_json::Value) -> Result<String> {
    match inner {
        serde_json::Value::String(s) => Ok(s),
        other => Err(Error::Decode(format!("{tag} payload is not a string: {other}"))),
    }
}

impl From<serde_json::Value> for Value {
    /// Plain conversion: tagged-looking objects stay ordinary objects.
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Self::Ref(r)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Self::from_wire(raw).map_err(serde::de::Error::custom)
    }
}

/// A stored document: reference, transaction timestamp and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Reference addressing this document.
    pub reference: Ref,
    /// Timestamp (microseconds) of the transaction that last wrote it.
    pub ts: Option<i64>,
    /// Payload stored under `data`.
    pub data: BTreeMap<String, Value>,
    /// Remaining envelope fields, such as `ttl`.
    pub extra: BTreeMap<String, Value>,
}

impl Document {
    /// Document id within its collection.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.reference.id
    }

    /// Payload rendered as a JSON object.
    #[must_use]
    pub fn data_json(&self) -> Data {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }

    /// Deserializes the payload into a caller type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the payload does not match `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(serde_json::Value::Object(
            self.data_json(),
        ))?)
    }
}

impl TryFrom<Value> for Document {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::Decode(format!(
                "expected document object, got {}",
                value.type_name()
            )));
        };

        let reference = match fields.remove("ref") {
            Some(Value::Ref(r)) => r,
            _ => return Err(Error::Decode("document without ref".to_string())),
        };
        let ts = fields.remove("ts").as_ref().and_then(Value::as_i64);
        let data = match fields.remove("data") {
            Some(Value::Object(data)) => data,
            None | Some(Value::Null) => BTreeMap::new(),
            Some(other) => {
                return Err(Error::Decode(format!(
                    "document data is {}, expected object",
                    other.type_name()
                )))
            }
        };

        Ok(Self {
            reference,
            ts,
            data,
            extra: fields,
        })
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
