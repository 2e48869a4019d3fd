//! Commands Layer
//!
//! Persistence gateway: typed board/list/card/comment operations over the
//! row store, each reporting a shared `{loading, error}` status.

mod board_cmd;
mod list_cmd;
mod card_cmd;
mod comment_cmd;
mod avatar_cmd;

#[cfg(test)]
mod tests;

pub use board_cmd::BoardCommands;
pub use list_cmd::ListCommands;
pub use card_cmd::CardCommands;
pub use comment_cmd::CommentCommands;
pub use avatar_cmd::{avatar_path, AvatarCommands};

use serde::Serialize;
use std::future::Future;
use tokio::sync::watch;

use crate::domain::{decode_row, DomainError, DomainResult, Entity, Row};

/// In-flight flag and last error of one gateway.
/// Calls sharing a gateway share this value; the last write wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GatewayStatus {
    pub loading: bool,
    pub error: Option<DomainError>,
}

/// Status tracker shared by every operation of one entity type
pub struct Gateway {
    name: &'static str,
    status: watch::Sender<GatewayStatus>,
}

impl Gateway {
    pub fn new(name: &'static str) -> Self {
        let (status, _) = watch::channel(GatewayStatus::default());
        Self { name, status }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> GatewayStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GatewayStatus> {
        self.status.subscribe()
    }

    /// Run one operation: set `loading`, then record its error (or clear it)
    pub async fn execute<T, F>(&self, op: &str, fut: F) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        self.status.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let result = fut.await;

        let error = result.as_ref().err().cloned();
        if let Some(e) = &error {
            log::error!("{} {} failed: {}", self.name, op, e);
        }
        self.status.send_modify(|s| {
            s.loading = false;
            s.error = error;
        });
        result
    }
}

/// First row of an insert result, decoded
pub(crate) fn first_row<T: Entity>(rows: Vec<Row>) -> DomainResult<T> {
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::Backend(format!("Insert into {} returned no row", T::TABLE)))?;
    decode_row(row)
}
