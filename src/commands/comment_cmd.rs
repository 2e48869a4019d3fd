//! Comment Commands
//!
//! Comments are append-only and fetched on demand per card.

use std::sync::Arc;
use tokio::sync::watch;

use super::{first_row, Gateway, GatewayStatus};
use crate::domain::validation::{require_id, validate_comment};
use crate::domain::{decode_rows, encode_row, Comment, DomainResult, NewComment, Table};
use crate::repository::{Query, RowStore};

pub struct CommentCommands {
    rows: Arc<dyn RowStore>,
    gateway: Gateway,
}

impl CommentCommands {
    pub fn new(rows: Arc<dyn RowStore>) -> Self {
        Self {
            rows,
            gateway: Gateway::new("comments"),
        }
    }

    pub fn status(&self) -> GatewayStatus {
        self.gateway.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<GatewayStatus> {
        self.gateway.subscribe()
    }

    /// Comments of a card, oldest first
    pub async fn fetch_for_card(&self, card_id: &str) -> DomainResult<Vec<Comment>> {
        self.gateway
            .execute("fetch", async move {
                require_id(card_id, "card")?;
                let query = Query::new().eq("card_id", card_id).order("created_at");
                decode_rows(self.rows.select(Table::Comments, &query).await?)
            })
            .await
    }

    pub async fn add(&self, card_id: &str, user_id: &str, text: &str) -> DomainResult<Comment> {
        self.gateway
            .execute("create", async move {
                require_id(card_id, "card")?;
                require_id(user_id, "user")?;
                let text = validate_comment(text)?;
                let row = encode_row(&NewComment {
                    card_id: card_id.to_string(),
                    user_id: user_id.to_string(),
                    text,
                })?;
                first_row(self.rows.insert(Table::Comments, vec![row]).await?)
            })
            .await
    }
}
