//! Simplified document operations over the query API.

use tracing::debug;

use crate::client::{FaunaClient, QueryExecutor};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::query::Expr;
use crate::value::{Data, Document, Value};

/// Page size used by [`DocumentStoreFacade::list_documents`].
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Lambda parameter used when mapping over a page of refs.
const PAGE_VAR: &str = "x";
/// Lambda parameter used when mapping over payloads in bulk create.
const DATA_VAR: &str = "data";

/// Thin facade turning simple CRUD calls into single queries.
///
/// Each method builds exactly one expression and awaits one call to the
/// executor. Errors are returned exactly as the executor raised them.
///
/// The facade is `Send + Sync` whenever its executor is; share it between
/// tasks with an `Arc`.
#[derive(Debug)]
pub struct DocumentStoreFacade<E = FaunaClient> {
    executor: E,
}

impl DocumentStoreFacade<FaunaClient> {
    /// Creates a facade backed by an HTTP client for the default endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSecret`] if the secret is malformed.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        Ok(Self::with_executor(FaunaClient::new(secret)?))
    }

    /// Creates a facade backed by an HTTP client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSecret`] or [`Error::Config`] if the
    /// configuration is invalid.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_executor(FaunaClient::from_config(config)?))
    }
}

impl<E: QueryExecutor> DocumentStoreFacade<E> {
    /// Wraps an existing executor.
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    /// Underlying executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Lists the first [`DEFAULT_PAGE_SIZE`] documents of a collection.
    ///
    /// # Errors
    ///
    /// Propagates the executor's error.
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<Document>> {
        self.list_documents_page(collection, DEFAULT_PAGE_SIZE).await
    }

    /// Lists up to `page_size` documents of a collection.
    ///
    /// Only the first page is returned; no cursor is exposed.
    ///
    /// # Errors
    ///
    /// Propagates the executor's error.
    pub async fn list_documents_page(
        &self,
        collection: &str,
        page_size: u32,
    ) -> Result<Vec<Document>> {
        debug!(collection, page_size, "Listing documents");
        let page = self.executor.query(&list_query(collection, page_size)).await?;
        let data = match page {
            Value::Object(mut fields) => fields
                .remove("data")
                .ok_or_else(|| Error::Decode("page without data".to_string()))?,
            other => {
                return Err(Error::Decode(format!(
                    "expected page object, got {}",
                    other.type_name()
                )))
            }
        };
        documents(data)
    }

    /// Fetches one document by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the document does not exist, or any
    /// other executor error.
    pub async fn get_by_ref(&self, collection: &str, id: &str) -> Result<Document> {
        debug!(collection, id, "Fetching document by ref");
        let value = self.executor.query(&get_query(collection, id)).await?;
        Document::try_from(value)
    }

    /// Fetches the document whose index entry equals `value`.
    ///
    /// When the index matches several documents the server returns the
    /// first one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if nothing matches, or any other executor
    /// error.
    pub async fn get_by_index(&self, index: &str, value: impl Into<Expr>) -> Result<Document> {
        debug!(index, "Fetching document by index");
        let result = self.executor.query(&index_query(index, value)).await?;
        Document::try_from(result)
    }

    /// Creates a document, at `custom_id` if given, otherwise with a
    /// server-assigned id. An empty `custom_id` counts as absent.
    ///
    /// # Errors
    ///
    /// Propagates the executor's error, e.g. [`Error::BadRequest`] when the
    /// custom id is already taken.
    pub async fn create_document(
        &self,
        collection: &str,
        data: Data,
        custom_id: Option<&str>,
    ) -> Result<Document> {
        debug!(collection, custom_id, "Creating document");
        let value = self
            .executor
            .query(&create_query(collection, data, custom_id))
            .await?;
        Document::try_from(value)
    }

    /// Creates one document per payload in a single call.
    ///
    /// Results are in input order.
    ///
    /// # Errors
    ///
    /// Propagates the executor's error.
    pub async fn create_multiple_documents(
        &self,
        collection: &str,
        items: Vec<Data>,
    ) -> Result<Vec<Document>> {
        debug!(collection, count = items.len(), "Creating documents");
        let value = self
            .executor
            .query(&create_many_query(collection, items))
            .await?;
        documents(value)
    }

    /// Merges `data` into an existing document.
    ///
    /// Nested objects merge recursively and a `null` field removes that
    /// field; fields not mentioned are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the document does not exist, or any
    /// other executor error.
    pub async fn update_document(&self, collection: &str, id: &str, data: Data) -> Result<Document> {
        debug!(collection, id, "Updating document");
        let value = self
            .executor
            .query(&update_query(collection, id, data))
            .await?;
        Document::try_from(value)
    }

    /// Replaces the whole payload of an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the document does not exist, or any
    /// other executor error.
    pub async fn replace_document(
        &self,
        collection: &str,
        id: &str,
        data: Data,
    ) -> Result<Document> {
        debug!(collection, id, "Replacing document");
        let value = self
            .executor
            .query(&replace_query(collection, id, data))
            .await?;
        Document::try_from(value)
    }

    /// Deletes a document and returns its last state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the document is already gone, or any
    /// other executor error.
    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<Document> {
        debug!(collection, id, "Deleting document");
        let value = self.executor.query(&delete_query(collection, id)).await?;
        Document::try_from(value)
    }
}

fn documents(value: Value) -> Result<Vec<Document>> {
    match value {
        Value::Array(items) => items.into_iter().map(Document::try_from).collect(),
        other => Err(Error::Decode(format!(
            "expected array of documents, got {}",
            other.type_name()
        ))),
    }
}

// -------------------------------------------------------------------------
// Query builders
// -------------------------------------------------------------------------

pub(crate) fn list_query(collection: &str, page_size: u32) -> Expr {
    Expr::map(
        Expr::paginate(Expr::documents(Expr::collection(collection)), Some(page_size)),
        Expr::lambda(PAGE_VAR, Expr::get(Expr::var(PAGE_VAR))),
    )
}

pub(crate) fn get_query(collection: &str, id: &str) -> Expr {
    Expr::get(Expr::reference(collection, id))
}

pub(crate) fn index_query(index: &str, value: impl Into<Expr>) -> Expr {
    Expr::get(Expr::match_index(Expr::index(index), value))
}

pub(crate) fn create_query(collection: &str, data: Data, custom_id: Option<&str>) -> Expr {
    let target = match custom_id.filter(|id| !id.is_empty()) {
        Some(id) => Expr::reference(collection, id),
        None => Expr::collection(collection),
    };
    Expr::create(target, Expr::data_params(data))
}

pub(crate) fn create_many_query(collection: &str, items: Vec<Data>) -> Expr {
    Expr::map(
        items,
        Expr::lambda(
            DATA_VAR,
            Expr::create(
                Expr::collection(collection),
                Expr::data_params(Expr::var(DATA_VAR)),
            ),
        ),
    )
}

pub(crate) fn update_query(collection: &str, id: &str, data: Data) -> Expr {
    Expr::update(Expr::reference(collection, id), Expr::data_params(data))
}

pub(crate) fn replace_query(collection: &str, id: &str, data: Data) -> Expr {
    Expr::replace(Expr::reference(collection, id), Expr::data_params(data))
}

pub(crate) fn delete_query(collection: &str, id: &str) -> Expr {
    Expr::delete(Expr::reference(collection, id))
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
