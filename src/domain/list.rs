//! List Entity
//!
//! Ordered column within a board. `position` ranks lists sharing a `board_id`.

use serde::{Deserialize, Serialize};
use super::entity::{Entity, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub title: String,
    pub board_id: String,
    /// Rank among siblings; dense or sparse, not necessarily unique
    pub position: i64,
}

impl Entity for List {
    const TABLE: Table = Table::Lists;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewList {
    pub title: String,
    pub board_id: String,
    pub position: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl ListPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn position(position: i64) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.position.is_none()
    }
}
