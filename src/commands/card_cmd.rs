//! Card Commands
//!
//! Cards are scoped by the list ids of the open board: writes carry a
//! `list_id in (...)` guard.

use std::sync::Arc;
use tokio::sync::watch;

use super::{first_row, Gateway, GatewayStatus};
use crate::domain::validation::{require_id, validate_title};
use crate::domain::{
    decode_row, decode_rows, encode_row, Card, CardPatch, DomainError, DomainResult, NewCard, Table,
};
use crate::repository::{Filter, Query, RowStore};

pub struct CardCommands {
    rows: Arc<dyn RowStore>,
    gateway: Gateway,
    max_title_len: usize,
}

impl CardCommands {
    pub fn new(rows: Arc<dyn RowStore>, max_title_len: usize) -> Self {
        Self {
            rows,
            gateway: Gateway::new("cards"),
            max_title_len,
        }
    }

    pub fn status(&self) -> GatewayStatus {
        self.gateway.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<GatewayStatus> {
        self.gateway.subscribe()
    }

    pub async fn create(
        &self,
        title: &str,
        list_id: &str,
        position: i64,
        description: Option<String>,
    ) -> DomainResult<Card> {
        self.gateway
            .execute("create", async move {
                let title = validate_title(title, self.max_title_len)?;
                require_id(list_id, "list")?;
                let row = encode_row(&NewCard {
                    title,
                    list_id: list_id.to_string(),
                    position,
                    description,
                })?;
                first_row(self.rows.insert(Table::Cards, vec![row]).await?)
            })
            .await
    }

    /// Cards in any of `list_ids`, ascending by position.
    /// No list ids means no cards, without a backend call.
    pub async fn fetch_all(&self, list_ids: &[String]) -> DomainResult<Vec<Card>> {
        if list_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.gateway
            .execute("fetch", async move {
                let query = Query::new()
                    .is_in("list_id", list_ids.iter().cloned())
                    .order("position");
                decode_rows(self.rows.select(Table::Cards, &query).await?)
            })
            .await
    }

    /// One card by id, with its details
    pub async fn fetch_one(&self, id: &str) -> DomainResult<Option<Card>> {
        self.gateway
            .execute("fetch_one", async move {
                require_id(id, "card")?;
                let rows = self.rows.select(Table::Cards, &Query::new().eq("id", id)).await?;
                rows.into_iter().next().map(decode_row).transpose()
            })
            .await
    }

    /// Patch a card whose current list is one of `scope`
    pub async fn update(&self, id: &str, patch: CardPatch, scope: &[String]) -> DomainResult<()> {
        self.gateway
            .execute("update", async move {
                require_id(id, "card")?;
                let mut patch = patch;
                if let Some(title) = &patch.title {
                    patch.title = Some(validate_title(title, self.max_title_len)?);
                }
                if let Some(list_id) = &patch.list_id {
                    require_id(list_id, "list")?;
                }
                if patch.is_empty() {
                    return Err(DomainError::InvalidInput("Nothing to update".into()));
                }
                self.rows
                    .update(Table::Cards, encode_row(&patch)?, &scope_guard(id, scope)?)
                    .await
            })
            .await
    }

    /// Delete a card and its comments; no matching card is a no-op
    pub async fn delete(&self, id: &str, scope: &[String]) -> DomainResult<()> {
        self.gateway
            .execute("delete", async move {
                require_id(id, "card")?;
                let guard = scope_guard(id, scope)?;

                let found = self
                    .rows
                    .select(Table::Cards, &Query { filters: guard.clone(), order_by: None })
                    .await?;
                if found.is_empty() {
                    log::debug!("Card {} already gone", id);
                    return Ok(());
                }

                self.rows
                    .delete(Table::Comments, &[Filter::eq("card_id", id)])
                    .await?;
                self.rows.delete(Table::Cards, &guard).await
            })
            .await
    }
}

fn scope_guard(id: &str, scope: &[String]) -> DomainResult<Vec<Filter>> {
    if scope.is_empty() {
        return Err(DomainError::InvalidInput(format!(
            "Card {} is outside any open list",
            id
        )));
    }
    Ok(vec![
        Filter::eq("id", id),
        Filter::is_in("list_id", scope.iter().cloned()),
    ])
}
