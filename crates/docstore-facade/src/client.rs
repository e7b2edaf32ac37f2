//! Query execution over HTTP.
//!
//! [`FaunaClient`] posts one JSON-encoded [`Expr`] per call to the query
//! endpoint and decodes the `resource` field of the response. Any type
//! implementing [`QueryExecutor`] can stand in for it behind the facade.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::query::Expr;
use crate::value::Value;

/// Wire protocol version sent with every request.
pub const API_VERSION: &str = "4";

const API_VERSION_HEADER: &str = "x-faunadb-api-version";
const DRIVER_HEADER: &str = "x-fauna-driver";
const QUERY_TIMEOUT_HEADER: &str = "x-query-timeout";
const LAST_SEEN_TXN_HEADER: &str = "x-last-seen-txn";
const TXN_TIME_HEADER: &str = "x-txn-time";

/// Executes one query expression against the document store.
///
/// Implementations must be safe to share between concurrent calls.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Evaluates `expr` and returns the decoded result.
    async fn query(&self, expr: &Expr) -> Result<Value>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for std::sync::Arc<T> {
    async fn query(&self, expr: &Expr) -> Result<Value> {
        (**self).query(expr).await
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    resource: Value,
}

/// HTTP executor for the query endpoint.
pub struct FaunaClient {
    http: Client,
    endpoint: String,
    last_txn_time: AtomicI64,
}

impl std::fmt::Debug for FaunaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaunaClient")
            .field("endpoint", &self.endpoint)
            .field("last_txn_time", &self.last_txn_time())
            .finish_non_exhaustive()
    }
}

impl FaunaClient {
    /// Creates a client for the default endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSecret`] if the secret is malformed.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        Self::from_config(&ClientConfig::new(secret))
    }

    /// Creates a client from a full configuration.
    ///
    /// No network call is made; a well-formed but wrong secret surfaces as
    /// [`Error::Unauthorized`] on the first query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSecret`] or [`Error::Config`] if the
    /// configuration is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let http = Client::builder()
            .default_headers(default_headers(config)?)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        debug!(endpoint = %config.endpoint, "Created query client");

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            last_txn_time: AtomicI64::new(0),
        })
    }

    /// Base URL queries are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Latest transaction time seen in a response, if any.
    #[must_use]
    pub fn last_txn_time(&self) -> Option<i64> {
        match self.last_txn_time.load(Ordering::Acquire) {
            0 => None,
            t => Some(t),
        }
    }

    /// Advances the last-seen transaction time; older values are ignored.
    pub fn sync_last_txn_time(&self, txn_time: i64) {
        self.last_txn_time.fetch_max(txn_time, Ordering::AcqRel);
    }

    fn build_url(&self) -> String {
        format!("{}/", self.endpoint.trim_end_matches('/'))
    }

    fn record_txn_time(&self, response: &Response) {
        let txn_time = response
            .headers()
            .get(TXN_TIME_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok());
        if let Some(t) = txn_time {
            self.sync_last_txn_time(t);
        }
    }
}

#[async_trait]
impl QueryExecutor for FaunaClient {
    async fn query(&self, expr: &Expr) -> Result<Value> {
        let mut request = self.http.post(self.build_url()).json(expr);
        if let Some(t) = self.last_txn_time() {
            request = request.header(LAST_SEEN_TXN_HEADER, t);
        }

        let response = request.send().await?;
        self.record_txn_time(&response);

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let err = Error::from_status(status.as_u16(), &body);
            warn!(status = status.as_u16(), code = err.code(), "Query failed: {}", err);
            return Err(err);
        }

        let body: QueryResponse = response.json().await?;
        debug!(status = status.as_u16(), "Query succeeded");
        Ok(body.resource)
    }
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.secret))
        .map_err(|_| Error::InvalidSecret("secret is not a valid header value".to_string()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
    headers.insert(
        DRIVER_HEADER,
        HeaderValue::from_static(env!("CARGO_PKG_NAME")),
    );
    if let Some(ms) = config.query_timeout_ms {
        headers.insert(QUERY_TIMEOUT_HEADER, HeaderValue::from(ms));
    }
    Ok(headers)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
