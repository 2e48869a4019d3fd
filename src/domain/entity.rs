//! Domain Layer - Core Entity Trait
//!
//! This trait defines the basic contract for all rows the board keeps:
//! a string id and the backend table the row lives in.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One backend row as a JSON object
pub type Row = serde_json::Map<String, Value>;

/// Backend tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Boards,
    Lists,
    Cards,
    Comments,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Boards => "boards",
            Table::Lists => "lists",
            Table::Cards => "cards",
            Table::Comments => "comments",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "boards" => Some(Table::Boards),
            "lists" => Some(Table::Lists),
            "cards" => Some(Table::Cards),
            "comments" => Some(Table::Comments),
            _ => None,
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core trait for all domain entities
pub trait Entity: Sized + Send + Sync + Clone + Serialize + DeserializeOwned {
    /// Table the entity is stored in
    const TABLE: Table;

    /// Returns the entity's unique identifier
    fn id(&self) -> &str;
}

/// Common result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DomainError {
    /// No session, or the session expired
    #[error("Not authenticated: {0}")]
    Auth(String),
    /// Row store, blob store or auth service returned an error
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

/// Serialize a value that must become a JSON object row
pub fn encode_row<T: Serialize>(value: &T) -> DomainResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(DomainError::Internal(format!(
            "Expected an object row, got {}",
            other
        ))),
    }
}

/// Decode one backend row into an entity
pub fn decode_row<T: Entity>(row: Row) -> DomainResult<T> {
    serde_json::from_value(Value::Object(row))
        .map_err(|e| DomainError::Internal(format!("Malformed {} row: {}", T::TABLE, e)))
}

/// Decode a result set into entities, failing on the first malformed row
pub fn decode_rows<T: Entity>(rows: Vec<Row>) -> DomainResult<Vec<T>> {
    rows.into_iter().map(decode_row).collect()
}
