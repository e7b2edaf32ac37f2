//! Query expression tree.
//!
//! [`Expr`] has one variant per query primitive the facade needs. Trees are
//! built with the associated constructors and serialized to the JSON wire
//! form accepted by the query endpoint:
//!
//! ```rust,ignore
//! use docstore_facade::query::Expr;
//!
//! let q = Expr::map(
//!     Expr::paginate(Expr::documents(Expr::collection("users")), Some(10)),
//!     Expr::lambda("x", Expr::get(Expr::var("x"))),
//! );
//! let wire = serde_json::to_value(&q)?;
//! ```

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::value::{Data, Ref, Value};

/// A query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Scalar literal: null, boolean, number or string.
    Literal(serde_json::Value),
    /// Array whose elements are evaluated.
    Array(Vec<Expr>),
    /// Object literal whose values are evaluated.
    Object(BTreeMap<String, Expr>),
    /// `Ref(collection, id)`.
    Ref {
        /// Collection expression.
        collection: Box<Expr>,
        /// Document id expression.
        id: Box<Expr>,
    },
    /// `Collection(name)`.
    Collection(Box<Expr>),
    /// `Index(name)`.
    Index(Box<Expr>),
    /// `Documents(collection)`: the set of all documents in a collection.
    Documents(Box<Expr>),
    /// `Get(ref_or_set)`.
    Get(Box<Expr>),
    /// `Match(index, terms)`.
    Match {
        /// Index expression.
        index: Box<Expr>,
        /// Search terms.
        terms: Box<Expr>,
    },
    /// `Paginate(set, { size })`.
    Paginate {
        /// Set to page through.
        set: Box<Expr>,
        /// Page size; server default when `None`.
        size: Option<u32>,
    },
    /// `Map(collection, lambda)`.
    Map {
        /// Array or page to map over.
        collection: Box<Expr>,
        /// Lambda applied to each element.
        lambda: Box<Expr>,
    },
    /// `Lambda(param, body)`.
    Lambda {
        /// Parameter name bound in `body`.
        param: String,
        /// Lambda body.
        body: Box<Expr>,
    },
    /// `Var(name)`.
    Var(String),
    /// `Create(collection_or_ref, params)`.
    Create {
        /// Collection, or a ref for caller-chosen ids.
        target: Box<Expr>,
        /// Create parameters, e.g. `{ data: {...} }`.
        params: Box<Expr>,
    },
    /// `Update(ref, params)`: merge fields, `null` removes a field.
    Update {
        /// Document ref.
        reference: Box<Expr>,
        /// Update parameters.
        params: Box<Expr>,
    },
    /// `Replace(ref, params)`: replace the whole payload.
    Replace {
        /// Document ref.
        reference: Box<Expr>,
        /// Replacement parameters.
        params: Box<Expr>,
    },
    /// `Delete(ref)`.
    Delete(Box<Expr>),
    /// `Time(iso8601)`.
    Time(String),
    /// `Date(iso8601)`.
    Date(String),
    /// Bytes literal.
    Bytes(Vec<u8>),
    /// Pre-encoded wire JSON, sent verbatim.
    Raw(serde_json::Value),
}

impl Expr {
    /// `Ref(Collection(collection), id)`.
    pub fn reference(collection: impl Into<Expr>, id: impl Into<Expr>) -> Self {
        Self::Ref {
            collection: Box::new(Self::collection(collection)),
            id: Box::new(id.into()),
        }
    }

    /// `Collection(name)`.
    pub fn collection(name: impl Into<Expr>) -> Self {
        Self::Collection(Box::new(name.into()))
    }

    /// `Index(name)`.
    pub fn index(name: impl Into<Expr>) -> Self {
        Self::Index(Box::new(name.into()))
    }

    /// `Documents(collection)`.
    pub fn documents(collection: Expr) -> Self {
        Self::Documents(Box::new(collection))
    }

    /// `Get(reference)`.
    pub fn get(reference: Expr) -> Self {
        Self::Get(Box::new(reference))
    }

    /// `Match(index, terms)`.
    pub fn match_index(index: Expr, terms: impl Into<Expr>) -> Self {
        Self::Match {
            index: Box::new(index),
            terms: Box::new(terms.into()),
        }
    }

    /// `Paginate(set, { size })`.
    pub fn paginate(set: Expr, size: Option<u32>) -> Self {
        Self::Paginate {
            set: Box::new(set),
            size,
        }
    }

    /// `Map(collection, lambda)`.
    pub fn map(collection: impl Into<Expr>, lambda: Expr) -> Self {
        Self::Map {
            collection: Box::new(collection.into()),
            lambda: Box::new(lambda),
        }
    }

    /// `Lambda(param, body)`.
    pub fn lambda(param: impl Into<String>, body: Expr) -> Self {
        Self::Lambda {
            param: param.into(),
            body: Box::new(body),
        }
    }

    /// `Var(name)`.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// `Create(target, params)`.
    pub fn create(target: Expr, params: impl Into<Expr>) -> Self {
        Self::Create {
            target: Box::new(target),
            params: Box::new(params.into()),
        }
    }

    /// `Update(reference, params)`.
    pub fn update(reference: Expr, params: impl Into<Expr>) -> Self {
        Self::Update {
            reference: Box::new(reference),
            params: Box::new(params.into()),
        }
    }

    /// `Replace(reference, params)`.
    pub fn replace(reference: Expr, params: impl Into<Expr>) -> Self {
        Self::Replace {
            reference: Box::new(reference),
            params: Box::new(params.into()),
        }
    }

    /// `Delete(reference)`.
    pub fn delete(reference: Expr) -> Self {
        Self::Delete(Box::new(reference))
    }

    /// Object literal from key/expression pairs.
    pub fn object<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Expr>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Parameters object `{ data: <data> }` used by create, update and replace.
    pub fn data_params(data: impl Into<Expr>) -> Self {
        Self::object([("data", data.into())])
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(v) | Self::Raw(v) => v.serialize(serializer),
            Self::Array(items) => items.serialize(serializer),
            Self::Object(fields) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("object", fields)?;
                map.end()
            }
            Self::Ref { collection, id } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ref", collection)?;
                map.serialize_entry("id", id)?;
                map.end()
            }
            Self::Collection(name) => single(serializer, "collection", name),
            Self::Index(name) => single(serializer, "index", name),
            Self::Documents(collection) => single(serializer, "documents", collection),
            Self::Get(reference) => single(serializer, "get", reference),
            Self::Match { index, terms } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("match", index)?;
                map.serialize_entry("terms", terms)?;
                map.end()
            }
            Self::Paginate { set, size } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("paginate", set)?;
                if let Some(size) = size {
                    map.serialize_entry("size", size)?;
                }
                map.end()
            }
            Self::Map { collection, lambda } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("map", lambda)?;
                map.serialize_entry("collection", collection)?;
                map.end()
            }
            Self::Lambda { param, body } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("lambda", param)?;
                map.serialize_entry("expr", body)?;
                map.end()
            }
            Self::Var(name) => single(serializer, "var", name),
            Self::Create { target, params } => pair(serializer, "create", target, params),
            Self::Update { reference, params } => pair(serializer, "update", reference, params),
            Self::Replace { reference, params } => pair(serializer, "replace", reference, params),
            Self::Delete(reference) => single(serializer, "delete", reference),
            Self::Time(iso) => single(serializer, "time", iso),
            Self::Date(iso) => single(serializer, "date", iso),
            Self::Bytes(bytes) => single(serializer, "@bytes", &URL_SAFE.encode(bytes)),
        }
    }
}

fn single<S: Serializer, T: Serialize + ?Sized>(
    serializer: S,
    key: &str,
    value: &T,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(key, value)?;
    map.end()
}

fn pair<S: Serializer>(
    serializer: S,
    key: &str,
    subject: &Expr,
    params: &Expr,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(2))?;
    map.serialize_entry(key, subject)?;
    map.serialize_entry("params", params)?;
    map.end()
}

// -------------------------------------------------------------------------
// Conversions
// -------------------------------------------------------------------------

impl From<serde_json::Value> for Expr {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::from(map),
            scalar => Self::Literal(scalar),
        }
    }
}

impl From<Data> for Expr {
    fn from(data: Data) -> Self {
        Self::Object(data.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Self::Literal(s.into())
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Self::Literal(s.into())
    }
}

impl From<&String> for Expr {
    fn from(s: &String) -> Self {
        Self::Literal(s.as_str().into())
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Self::Literal(b.into())
    }
}

macro_rules! expr_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Expr {
                fn from(n: $t) -> Self {
                    Self::Literal(n.into())
                }
            }
        )*
    };
}

expr_from_number!(i32, i64, u32, u64, f64);

impl<T: Into<Expr>> From<Vec<T>> for Expr {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<&Ref> for Expr {
    /// Rebuilds the constructor call that produces this reference.
    fn from(r: &Ref) -> Self {
        if r.is_collection() {
            return Self::collection(r.id.as_str());
        }
        if r.is_index() {
            return Self::index(r.id.as_str());
        }
        match r.collection.as_deref() {
            Some(parent) if parent.is_collection() => Self::Ref {
                collection: Box::new(Self::collection(parent.id.as_str())),
                id: Box::new(r.id.as_str().into()),
            },
            _ => Self::Raw(r.to_json()),
        }
    }
}

impl From<Ref> for Expr {
    fn from(r: Ref) -> Self {
        Self::from(&r)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Literal(serde_json::Value::Null),
            Value::Bool(b) => Self::Literal(b.into()),
            Value::Number(n) => Self::Literal(serde_json::Value::Number(n)),
            Value::String(s) => Self::Literal(s.into()),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(fields) => {
                Self::Object(fields.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
            Value::Ref(r) => Self::from(&r),
            Value::Timestamp(ts) => Self::Time(ts),
            Value::Date(date) => Self::Date(date),
            Value::Bytes(bytes) => Self::Bytes(bytes),
            other @ (Value::Set(_) | Value::Query(_)) => Self::Raw(other.to_json()),
        }
    }
}

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;
