//! Recording row store for tests
//!
//! Wraps another row store, records every call and can fail the next one.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::traits::{Filter, Query, RowStore};
use crate::domain::{DomainError, DomainResult, Row, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Insert,
    Select,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: Op,
    pub table: Table,
    pub filters: Vec<Filter>,
    /// Patch for updates, first row for inserts
    pub payload: Option<Row>,
}

pub struct RecordingStore {
    inner: Arc<dyn RowStore>,
    calls: Mutex<Vec<Call>>,
    fail_next: Mutex<Option<DomainError>>,
}

impl RecordingStore {
    pub fn new(inner: Arc<dyn RowStore>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// The next call returns `error` without reaching the inner store
    pub fn fail_next(&self, error: DomainError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    fn record(&self, op: Op, table: Table, filters: Vec<Filter>, payload: Option<Row>) -> DomainResult<()> {
        self.calls.lock().unwrap().push(Call { op, table, filters, payload });
        match self.fail_next.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RowStore for RecordingStore {
    async fn insert(&self, table: Table, rows: Vec<Row>) -> DomainResult<Vec<Row>> {
        self.record(Op::Insert, table, Vec::new(), rows.first().cloned())?;
        self.inner.insert(table, rows).await
    }

    async fn select(&self, table: Table, query: &Query) -> DomainResult<Vec<Row>> {
        self.record(Op::Select, table, query.filters.clone(), None)?;
        self.inner.select(table, query).await
    }

    async fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> DomainResult<()> {
        self.record(Op::Update, table, filters.to_vec(), Some(patch.clone()))?;
        self.inner.update(table, patch, filters).await
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> DomainResult<()> {
        self.record(Op::Delete, table, filters.to_vec(), None)?;
        self.inner.delete(table, filters).await
    }
}
