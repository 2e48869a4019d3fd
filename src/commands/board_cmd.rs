//! Board Commands
//!
//! Boards are scoped by owner: every write re-asserts `user_id`.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

use super::{first_row, Gateway, GatewayStatus};
use crate::domain::validation::{require_id, validate_title};
use crate::domain::{decode_rows, encode_row, Board, BoardPatch, DomainError, DomainResult, NewBoard, Table};
use crate::repository::{Filter, Query, RowStore};

pub struct BoardCommands {
    rows: Arc<dyn RowStore>,
    gateway: Gateway,
    max_title_len: usize,
}

impl BoardCommands {
    pub fn new(rows: Arc<dyn RowStore>, max_title_len: usize) -> Self {
        Self {
            rows,
            gateway: Gateway::new("boards"),
            max_title_len,
        }
    }

    pub fn status(&self) -> GatewayStatus {
        self.gateway.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<GatewayStatus> {
        self.gateway.subscribe()
    }

    /// Create a board owned by `user_id`
    pub async fn create(&self, title: &str, user_id: &str) -> DomainResult<Board> {
        self.gateway
            .execute("create", async move {
                let title = validate_title(title, self.max_title_len)?;
                require_id(user_id, "user")?;
                let row = encode_row(&NewBoard {
                    title,
                    user_id: user_id.to_string(),
                })?;
                first_row(self.rows.insert(Table::Boards, vec![row]).await?)
            })
            .await
    }

    /// All boards of `user_id`, in insertion order
    pub async fn fetch_all(&self, user_id: &str) -> DomainResult<Vec<Board>> {
        self.gateway
            .execute("fetch", async move {
                require_id(user_id, "user")?;
                let rows = self
                    .rows
                    .select(Table::Boards, &Query::new().eq("user_id", user_id))
                    .await?;
                decode_rows(rows)
            })
            .await
    }

    pub async fn update(&self, id: &str, patch: BoardPatch, user_id: &str) -> DomainResult<()> {
        self.gateway
            .execute("update", async move {
                require_id(id, "board")?;
                require_id(user_id, "user")?;
                let mut patch = patch;
                if let Some(title) = &patch.title {
                    patch.title = Some(validate_title(title, self.max_title_len)?);
                }
                if patch.is_empty() {
                    return Err(DomainError::InvalidInput("Nothing to update".into()));
                }
                self.rows
                    .update(Table::Boards, encode_row(&patch)?, &owner_guard(id, user_id))
                    .await
            })
            .await
    }

    /// Delete a board and everything under it: comments, cards, lists, then the board.
    /// A board that is already gone, or not owned by `user_id`, deletes nothing.
    pub async fn delete(&self, id: &str, user_id: &str) -> DomainResult<()> {
        self.gateway
            .execute("delete", async move {
                require_id(id, "board")?;
                require_id(user_id, "user")?;
                let guard = owner_guard(id, user_id);

                let owned = self
                    .rows
                    .select(Table::Boards, &Query { filters: guard.clone(), order_by: None })
                    .await?;
                if owned.is_empty() {
                    log::debug!("Board {} already gone", id);
                    return Ok(());
                }

                let list_ids = ids(self.rows.select(Table::Lists, &Query::new().eq("board_id", id)).await?);
                if !list_ids.is_empty() {
                    let card_ids = ids(
                        self.rows
                            .select(Table::Cards, &Query::new().is_in("list_id", list_ids.clone()))
                            .await?,
                    );
                    if !card_ids.is_empty() {
                        self.rows
                            .delete(Table::Comments, &[Filter::is_in("card_id", card_ids)])
                            .await?;
                        self.rows
                            .delete(Table::Cards, &[Filter::is_in("list_id", list_ids)])
                            .await?;
                    }
                    self.rows
                        .delete(Table::Lists, &[Filter::eq("board_id", id)])
                        .await?;
                }
                self.rows.delete(Table::Boards, &guard).await?;
                log::info!("Deleted board {}", id);
                Ok(())
            })
            .await
    }
}

fn owner_guard(id: &str, user_id: &str) -> Vec<Filter> {
    vec![Filter::eq("id", id), Filter::eq("user_id", user_id)]
}

/// The `id` column of each row
pub(crate) fn ids(rows: Vec<crate::domain::Row>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|mut r| match r.remove("id") {
            Some(Value::String(id)) => Some(id),
            _ => None,
        })
        .collect()
}
