//! Comment Entity
//!
//! Append-only remarks on a card. Fetched on demand by the card view,
//! never kept in the store's collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::entity::{Entity, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub card_id: String,
    #[serde(rename = "user_id")]
    pub author: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for Comment {
    const TABLE: Table = Table::Comments;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewComment {
    pub card_id: String,
    pub user_id: String,
    pub text: String,
}
