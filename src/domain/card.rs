//! Card Entity
//!
//! Leaf work item within a list, with optional details shown in the card view.

use serde::{Deserialize, Serialize};
use super::entity::{Entity, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub title: String,
    pub list_id: String,
    /// Rank among cards of the same list
    pub position: i64,
    #[serde(default)]
    pub description: Option<String>,
    /// Attachment names
    #[serde(default)]
    pub attachments: Option<Vec<String>>,
}

impl Card {
    /// Case-insensitive title match; an empty query matches everything
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        query.is_empty() || self.title.to_lowercase().contains(&query.to_lowercase())
    }
}

impl Entity for Card {
    const TABLE: Table = Table::Cards;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCard {
    pub title: String,
    pub list_id: String,
    pub position: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CardPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<String>>,
}

impl CardPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Move into `list_id` at `position`
    pub fn moved(list_id: impl Into<String>, position: i64) -> Self {
        Self {
            list_id: Some(list_id.into()),
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn details(description: impl Into<String>, attachments: Vec<String>) -> Self {
        Self {
            description: Some(description.into()),
            attachments: Some(attachments),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.list_id.is_none()
            && self.position.is_none()
            && self.description.is_none()
            && self.attachments.is_none()
    }
}
