//! List Commands

use std::sync::Arc;
use tokio::sync::watch;

use super::board_cmd::ids;
use super::{first_row, Gateway, GatewayStatus};
use crate::domain::validation::{require_id, validate_title};
use crate::domain::{decode_rows, encode_row, DomainError, DomainResult, List, ListPatch, NewList, Table};
use crate::repository::{Filter, Query, RowStore};

pub struct ListCommands {
    rows: Arc<dyn RowStore>,
    gateway: Gateway,
    max_title_len: usize,
}

impl ListCommands {
    pub fn new(rows: Arc<dyn RowStore>, max_title_len: usize) -> Self {
        Self {
            rows,
            gateway: Gateway::new("lists"),
            max_title_len,
        }
    }

    pub fn status(&self) -> GatewayStatus {
        self.gateway.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<GatewayStatus> {
        self.gateway.subscribe()
    }

    pub async fn create(&self, title: &str, board_id: &str, position: i64) -> DomainResult<List> {
        self.gateway
            .execute("create", async move {
                let title = validate_title(title, self.max_title_len)?;
                require_id(board_id, "board")?;
                let row = encode_row(&NewList {
                    title,
                    board_id: board_id.to_string(),
                    position,
                })?;
                first_row(self.rows.insert(Table::Lists, vec![row]).await?)
            })
            .await
    }

    /// Lists of a board, ascending by position
    pub async fn fetch_all(&self, board_id: &str) -> DomainResult<Vec<List>> {
        self.gateway
            .execute("fetch", async move {
                require_id(board_id, "board")?;
                let query = Query::new().eq("board_id", board_id).order("position");
                decode_rows(self.rows.select(Table::Lists, &query).await?)
            })
            .await
    }

    /// Patch a list, guarded by its board
    pub async fn update(&self, id: &str, patch: ListPatch, board_id: &str) -> DomainResult<()> {
        self.gateway
            .execute("update", async move {
                require_id(id, "list")?;
                require_id(board_id, "board")?;
                let mut patch = patch;
                if let Some(title) = &patch.title {
                    patch.title = Some(validate_title(title, self.max_title_len)?);
                }
                if patch.is_empty() {
                    return Err(DomainError::InvalidInput("Nothing to update".into()));
                }
                self.rows
                    .update(Table::Lists, encode_row(&patch)?, &board_guard(id, board_id))
                    .await
            })
            .await
    }

    /// Delete a list with its cards and their comments; no matching list is a no-op
    pub async fn delete(&self, id: &str, board_id: &str) -> DomainResult<()> {
        self.gateway
            .execute("delete", async move {
                require_id(id, "list")?;
                require_id(board_id, "board")?;
                let guard = board_guard(id, board_id);

                let found = self
                    .rows
                    .select(Table::Lists, &Query { filters: guard.clone(), order_by: None })
                    .await?;
                if found.is_empty() {
                    log::debug!("List {} already gone", id);
                    return Ok(());
                }

                let card_ids = ids(self.rows.select(Table::Cards, &Query::new().eq("list_id", id)).await?);
                if !card_ids.is_empty() {
                    self.rows
                        .delete(Table::Comments, &[Filter::is_in("card_id", card_ids)])
                        .await?;
                    self.rows
                        .delete(Table::Cards, &[Filter::eq("list_id", id)])
                        .await?;
                }
                self.rows.delete(Table::Lists, &guard).await
            })
            .await
    }
}

fn board_guard(id: &str, board_id: &str) -> Vec<Filter> {
    vec![Filter::eq("id", id), Filter::eq("board_id", board_id)]
}
