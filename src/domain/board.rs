//! Board Entity
//!
//! Top-level container owned by one user. Root of the Board → List → Card tree.

use serde::{Deserialize, Serialize};
use super::entity::{Entity, Table};

/// A board, as stored in the `boards` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    /// Backend-assigned identifier
    pub id: String,
    pub title: String,
    /// Owning user (`user_id` column)
    #[serde(rename = "user_id")]
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
}

impl Board {
    pub fn is_favorite(&self) -> bool {
        self.favorite.unwrap_or(false)
    }
}

impl Entity for Board {
    const TABLE: Table = Table::Boards;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Insert payload for a board
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewBoard {
    pub title: String,
    pub user_id: String,
}

/// Partial update of a board's mutable fields
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoardPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
}

impl BoardPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn favorite(favorite: bool) -> Self {
        Self {
            favorite: Some(favorite),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.favorite.is_none()
    }
}
