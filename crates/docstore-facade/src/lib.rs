//! # Document Store Facade
//!
//! `docstore-facade` is a small async library that turns everyday CRUD calls
//! into single FQL queries against a Fauna-compatible document database.
//!
//! ## Operations
//!
//! | Method | Query |
//! |--------|-------|
//! | `list_documents` | `Map(Paginate(Documents(Collection(c)), {size: 10}), Lambda("x", Get(Var("x"))))` |
//! | `get_by_ref` | `Get(Ref(Collection(c), id))` |
//! | `get_by_index` | `Get(Match(Index(i), value))` |
//! | `create_document` | `Create(Collection(c) or Ref(Collection(c), id), {data})` |
//! | `create_multiple_documents` | `Map(items, Lambda("data", Create(Collection(c), {data: Var("data")})))` |
//! | `update_document` | `Update(Ref(Collection(c), id), {data})` |
//! | `replace_document` | `Replace(Ref(Collection(c), id), {data})` |
//! | `delete_document` | `Delete(Ref(Collection(c), id))` |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docstore_facade::{Data, DocumentStoreFacade};
//! use serde_json::json;
//!
//! let store = DocumentStoreFacade::new("fnSecret")?;
//!
//! let mut data = Data::new();
//! data.insert("name".into(), json!("Ann"));
//! let doc = store.create_document("users", data, Some("1")).await?;
//!
//! let same = store.get_by_ref("users", doc.id()).await?;
//! ```
//!
//! ## Configuration
//!
//! [`ClientConfig::load`] reads `docstore.toml` and `FAUNA_*` environment
//! variables:
//!
//! ```toml
//! secret = "fnAbc..."
//! endpoint = "https://db.fauna.com"
//! timeout_secs = 60
//! query_timeout_ms = 5000
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod facade;
pub mod query;
pub mod value;

pub use client::{FaunaClient, QueryExecutor};
pub use config::ClientConfig;
pub use error::{Error, ErrorKind, QueryError, Result, ServerErrors};
pub use facade::{DocumentStoreFacade, DEFAULT_PAGE_SIZE};
pub use query::Expr;
pub use value::{Data, Document, Ref, Value};
