//! Drag-and-drop reorder
//!
//! Turns a finished drag into position updates for lists or cards.
//! Lists are renumbered `0..n` in their new order and only lists whose
//! position changed are written. Cards follow the configured policy.

use kanban_dnd::{reinsert, DragKind, DragResult};
use serde::{Deserialize, Serialize};

use crate::domain::{Card, DomainError, DomainResult, List};
use crate::store::{AppState, BoardStore};

/// How a card drop is written back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderPolicy {
    /// Only the moved card: `list_id` and `position = destination index`.
    /// Siblings keep their positions, so ranks may collide.
    #[default]
    MovedOnly,
    /// Renumber the destination list (and the source list, if different) densely
    Renumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionUpdate {
    pub id: String,
    pub position: i64,
    /// New parent list, cards only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
}

impl PositionUpdate {
    fn list(id: &str, position: usize) -> Self {
        Self {
            id: id.to_string(),
            position: position as i64,
            list_id: None,
        }
    }

    fn card(id: &str, list_id: &str, position: usize) -> Self {
        Self {
            id: id.to_string(),
            position: position as i64,
            list_id: Some(list_id.to_string()),
        }
    }
}

/// Updates for one gesture, in the order they are issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderPlan {
    Lists {
        board_id: String,
        updates: Vec<PositionUpdate>,
    },
    Cards { updates: Vec<PositionUpdate> },
}

impl ReorderPlan {
    pub fn updates(&self) -> &[PositionUpdate] {
        match self {
            ReorderPlan::Lists { updates, .. } | ReorderPlan::Cards { updates } => updates,
        }
    }

    /// Optimistic local patch; the refetch after the updates reconciles it
    pub(crate) fn apply_local(&self, state: &mut AppState) {
        match self {
            ReorderPlan::Lists { updates, .. } => {
                for u in updates {
                    if let Some(list) = state.lists.iter_mut().find(|l| l.id == u.id) {
                        list.position = u.position;
                    }
                }
                state.lists.sort_by_key(|l| l.position);
            }
            ReorderPlan::Cards { updates } => {
                for u in updates {
                    if let Some(card) = state.cards.iter_mut().find(|c| c.id == u.id) {
                        card.position = u.position;
                        if let Some(list_id) = &u.list_id {
                            card.list_id = list_id.clone();
                        }
                    }
                }
                state.cards.sort_by_key(|c| c.position);
            }
        }
    }
}

/// Plan the updates for a finished drag.
/// `None` for a cancelled drop, a drop back onto its origin, or a move that
/// changes no position.
pub fn plan(state: &AppState, drag: &DragResult, policy: ReorderPolicy) -> DomainResult<Option<ReorderPlan>> {
    let destination = match &drag.destination {
        Some(d) if !drag.is_noop() => d,
        _ => return Ok(None),
    };

    match drag.kind {
        DragKind::List => plan_lists(state, &drag.draggable_id, destination.index),
        DragKind::Card => {
            let updates = match policy {
                ReorderPolicy::MovedOnly => vec![PositionUpdate::card(
                    &drag.draggable_id,
                    &destination.container_id,
                    destination.index,
                )],
                ReorderPolicy::Renumber => {
                    renumber_cards(state, &drag.draggable_id, &destination.container_id, destination.index)?
                }
            };
            Ok((!updates.is_empty()).then_some(ReorderPlan::Cards { updates }))
        }
    }
}

fn plan_lists(state: &AppState, list_id: &str, to: usize) -> DomainResult<Option<ReorderPlan>> {
    let mut order: Vec<&List> = state.lists.iter().collect();
    order.sort_by_key(|l| l.position);

    let from = order
        .iter()
        .position(|l| l.id == list_id)
        .ok_or_else(|| DomainError::NotFound(format!("List {}", list_id)))?;
    let board_id = order[from].board_id.clone();
    reinsert(&mut order, from, to);

    let updates: Vec<PositionUpdate> = order
        .iter()
        .enumerate()
        .filter(|(i, l)| l.position != *i as i64)
        .map(|(i, l)| PositionUpdate::list(&l.id, i))
        .collect();

    Ok((!updates.is_empty()).then_some(ReorderPlan::Lists { board_id, updates }))
}

fn renumber_cards(state: &AppState, card_id: &str, dest_list: &str, to: usize) -> DomainResult<Vec<PositionUpdate>> {
    let moved: &Card = state
        .card(card_id)
        .ok_or_else(|| DomainError::NotFound(format!("Card {}", card_id)))?;
    let source_list = moved.list_id.as_str();

    let mut dest: Vec<&Card> = state
        .cards_in(dest_list)
        .into_iter()
        .filter(|c| c.id != card_id)
        .collect();
    dest.insert(to.min(dest.len()), moved);

    let mut updates: Vec<PositionUpdate> = dest
        .iter()
        .enumerate()
        .filter(|(i, c)| c.position != *i as i64 || c.list_id != dest_list)
        .map(|(i, c)| PositionUpdate::card(&c.id, dest_list, i))
        .collect();

    if source_list != dest_list {
        updates.extend(
            state
                .cards_in(source_list)
                .into_iter()
                .filter(|c| c.id != card_id)
                .enumerate()
                .filter(|(i, c)| c.position != *i as i64)
                .map(|(i, c)| PositionUpdate::card(&c.id, source_list, i)),
        );
    }
    Ok(updates)
}

/// Handle a finished drag: plan it, then apply it through the store.
/// Returns the number of updates written; zero means no backend call.
pub async fn on_drag_end(store: &BoardStore, drag: &DragResult) -> DomainResult<usize> {
    let snapshot = store.snapshot();
    match plan(&snapshot, drag, store.options().card_reorder)? {
        Some(plan) => {
            log::info!(
                "Reordering {:?} {}: {} updates",
                drag.kind,
                drag.draggable_id,
                plan.updates().len()
            );
            store.apply_reorder(plan).await
        }
        None => Ok(0),
    }
}
