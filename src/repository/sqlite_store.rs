//! SQLite Row Store
//!
//! Embedded implementation of the row-store contract. Rows travel as JSON
//! objects and are converted per column using the schema in `db`.

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::db::{self, Column, ColumnKind};
use super::traits::{Filter, Query, RowStore};
use crate::domain::{DomainError, DomainResult, Row, Table};

/// SQLite implementation of the row store
pub struct SqliteRowStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRowStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Open (or create) a database file
    pub fn open(path: &Path) -> DomainResult<Self> {
        let conn = db::init_db(path)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    pub fn open_in_memory() -> DomainResult<Self> {
        let conn = db::init_memory_db()?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }
}

fn backend(e: rusqlite::Error) -> DomainError {
    DomainError::Backend(e.to_string())
}

fn type_mismatch(column: &Column, value: &Value) -> DomainError {
    DomainError::InvalidInput(format!("Column {} cannot hold {}", column.name, value))
}

/// JSON value to SQL value for the given column
fn to_sql(column: &Column, value: &Value) -> DomainResult<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    match column.kind {
        ColumnKind::Text => match value {
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Number(n) => Ok(SqlValue::Text(n.to_string())),
            _ => Err(type_mismatch(column, value)),
        },
        ColumnKind::Integer => value
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| type_mismatch(column, value)),
        ColumnKind::Bool => match value {
            Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            Value::Number(n) => n
                .as_i64()
                .map(|i| SqlValue::Integer(i64::from(i != 0)))
                .ok_or_else(|| type_mismatch(column, value)),
            _ => Err(type_mismatch(column, value)),
        },
        ColumnKind::Json => Ok(SqlValue::Text(serde_json::to_string(value)?)),
    }
}

/// SQL value back to JSON for the given column
fn from_sql(column: &Column, value: SqlValue) -> DomainResult<Value> {
    let json = match (column.kind, value) {
        (_, SqlValue::Null) => Value::Null,
        (ColumnKind::Text, SqlValue::Text(s)) => Value::String(s),
        (ColumnKind::Text, SqlValue::Integer(i)) => Value::String(i.to_string()),
        (ColumnKind::Integer, SqlValue::Integer(i)) => Value::from(i),
        (ColumnKind::Bool, SqlValue::Integer(i)) => Value::Bool(i != 0),
        (ColumnKind::Json, SqlValue::Text(s)) => serde_json::from_str(&s)?,
        (_, other) => {
            return Err(DomainError::Internal(format!(
                "Unexpected stored value for {}: {:?}",
                column.name, other
            )))
        }
    };
    Ok(json)
}

/// Build ` WHERE ...` (or an empty string) and push its parameters
fn where_clause(table: Table, filters: &[Filter], params: &mut Vec<SqlValue>) -> DomainResult<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }
    let mut parts = Vec::with_capacity(filters.len());
    for filter in filters {
        let column = db::column(table, filter.column())?;
        match filter {
            Filter::Eq(_, value) => {
                if value.is_null() {
                    parts.push(format!("{} IS NULL", column.name));
                } else {
                    params.push(to_sql(&column, value)?);
                    parts.push(format!("{} = ?", column.name));
                }
            }
            Filter::In(_, values) => {
                if values.is_empty() {
                    parts.push("1 = 0".to_string());
                    continue;
                }
                for value in values {
                    params.push(to_sql(&column, value)?);
                }
                let marks = vec!["?"; values.len()].join(", ");
                parts.push(format!("{} IN ({})", column.name, marks));
            }
        }
    }
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

fn select_rows(conn: &Connection, table: Table, query: &Query) -> DomainResult<Vec<Row>> {
    let cols = db::columns(table);
    let mut params = Vec::new();
    let where_sql = where_clause(table, &query.filters, &mut params)?;
    // rowid keeps insertion order for ties and unordered selects
    let order_sql = match &query.order_by {
        Some(name) => format!(" ORDER BY {} ASC, rowid ASC", db::column(table, name)?.name),
        None => " ORDER BY rowid ASC".to_string(),
    };
    let names: Vec<&str> = cols.iter().map(|c| c.name).collect();
    let sql = format!("SELECT {} FROM {}{}{}", names.join(", "), table, where_sql, order_sql);

    let mut stmt = conn.prepare(&sql).map_err(backend)?;
    let mut rows = stmt.query(params_from_iter(params.iter())).map_err(backend)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(backend)? {
        let mut record = Row::new();
        for (i, c) in cols.iter().enumerate() {
            let raw: SqlValue = row.get(i).map_err(backend)?;
            record.insert(c.name.to_string(), from_sql(c, raw)?);
        }
        out.push(record);
    }
    Ok(out)
}

fn insert_row(conn: &Connection, table: Table, mut row: Row) -> DomainResult<Row> {
    let id = match row.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => uuid::Uuid::new_v4().to_string(),
    };
    row.insert("id".to_string(), Value::String(id.clone()));

    if db::column(table, "created_at").is_ok() && !row.contains_key("created_at") {
        row.insert(
            "created_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }

    let mut names = Vec::with_capacity(row.len());
    let mut params = Vec::with_capacity(row.len());
    for (name, value) in &row {
        let column = db::column(table, name)?;
        names.push(column.name);
        params.push(to_sql(&column, value)?);
    }
    let marks = vec!["?"; names.len()].join(", ");
    let sql = format!("INSERT INTO {} ({}) VALUES ({})", table, names.join(", "), marks);
    conn.execute(&sql, params_from_iter(params.iter()))
        .map_err(backend)?;

    select_rows(conn, table, &Query::new().eq("id", id.as_str()))?
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::Internal(format!("Inserted {} row {} vanished", table, id)))
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn insert(&self, table: Table, rows: Vec<Row>) -> DomainResult<Vec<Row>> {
        let conn = self.conn.lock().await;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            inserted.push(insert_row(&conn, table, row)?);
        }
        Ok(inserted)
    }

    async fn select(&self, table: Table, query: &Query) -> DomainResult<Vec<Row>> {
        let conn = self.conn.lock().await;
        select_rows(&conn, table, query)
    }

    async fn update(&self, table: Table, patch: Row, filters: &[Filter]) -> DomainResult<()> {
        if patch.is_empty() {
            return Err(DomainError::InvalidInput("Empty update".into()));
        }
        if filters.is_empty() {
            return Err(DomainError::InvalidInput(format!("Refusing unfiltered update of {}", table)));
        }
        if patch.contains_key("id") {
            return Err(DomainError::InvalidInput("Row ids are immutable".into()));
        }

        let mut sets = Vec::with_capacity(patch.len());
        let mut params = Vec::with_capacity(patch.len());
        for (name, value) in &patch {
            let column = db::column(table, name)?;
            sets.push(format!("{} = ?", column.name));
            params.push(to_sql(&column, value)?);
        }
        let where_sql = where_clause(table, filters, &mut params)?;
        let sql = format!("UPDATE {} SET {}{}", table, sets.join(", "), where_sql);

        let conn = self.conn.lock().await;
        conn.execute(&sql, params_from_iter(params.iter()))
            .map_err(backend)?;
        Ok(())
    }

    async fn delete(&self, table: Table, filters: &[Filter]) -> DomainResult<()> {
        if filters.is_empty() {
            return Err(DomainError::InvalidInput(format!("Refusing unfiltered delete of {}", table)));
        }
        let mut params = Vec::new();
        let where_sql = where_clause(table, filters, &mut params)?;
        let sql = format!("DELETE FROM {}{}", table, where_sql);

        let conn = self.conn.lock().await;
        conn.execute(&sql, params_from_iter(params.iter()))
            .map_err(backend)?;
        Ok(())
    }
}
