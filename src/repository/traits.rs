//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces of the hosted backend:
//! a row store, an auth provider and a blob store.
//! Implementations can use the hosted REST service, SQLite, etc.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::domain::{DomainResult, Row, Session, Table};

/// Row filter. Filters passed together are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(String, Value),
    /// `column in (values...)`
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn is_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(column.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::In(c, _) => c,
        }
    }

    /// Whether an in-memory row satisfies this filter
    pub fn matches(&self, row: &Row) -> bool {
        let value = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(_, expected) => value == expected,
            Filter::In(_, candidates) => candidates.iter().any(|c| c == value),
        }
    }
}

/// Select query: filters plus an optional ascending order-by column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn is_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filters.push(Filter::is_in(column, values));
        self
    }

    /// Ascending order by `column`
    pub fn order(mut self, column: &str) -> Self {
        self.order_by = Some(column.to_string());
        self
    }
}

/// Row storage contract of the hosted database
///
/// An empty result set is success with zero rows, never an error.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert rows and return them as stored (with backend-assigned fields)
    async fn insert(&self, table: Table, rows: Vec<Row>) -> DomainResult<Vec<Row>>;

    /// Select rows matching every filter
    async fn select(&self, table: Table, query: &Query) -> DomainResult<Vec<Row>>;

    /// Apply `patch` to every row matching all filters
    async fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> DomainResult<()>;

    /// Delete every row matching all filters
    async fn delete(&self, table: Table, filters: &[Filter]) -> DomainResult<()>;
}

/// Authentication provider
///
/// Session changes (sign-in, sign-out, token refresh) are published on a
/// watch channel; dropping the receiver unsubscribes.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn current_session(&self) -> Option<Session>;

    fn subscribe(&self) -> watch::Receiver<Option<Session>>;

    async fn sign_in(&self, email: &str, password: &str) -> DomainResult<Session>;

    /// Register an account. `None` means the account waits for email confirmation.
    async fn sign_up(&self, email: &str, password: &str) -> DomainResult<Option<Session>>;

    async fn sign_out(&self) -> DomainResult<()>;
}

/// Upload options for the blob store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Cache lifetime in seconds, as sent in `cache-control`
    pub cache_control: String,
    /// Overwrite an existing object at the same path
    pub upsert: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            cache_control: "3600".to_string(),
            upsert: false,
        }
    }
}

/// Object storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `blob` at `bucket/path`, returning the stored key
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        blob: Vec<u8>,
        options: UploadOptions,
    ) -> DomainResult<String>;
}
