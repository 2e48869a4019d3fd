//! Global Application State Store
//!
//! One process-wide state container holding boards, lists and cards of the
//! open board plus the selection. Mutators go through the gateway and then
//! refetch the affected collection; subscribers are notified through a
//! `watch` channel.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

use crate::commands::{
    AvatarCommands, BoardCommands, CardCommands, CommentCommands, GatewayStatus, ListCommands,
};
use crate::config::KanbanConfig;
use crate::domain::validation::DEFAULT_MAX_TITLE_LEN;
use crate::domain::{
    Board, BoardPatch, Card, CardPatch, Comment, DomainError, DomainResult, List, ListPatch,
};
use crate::reorder::{ReorderPlan, ReorderPolicy};
use crate::repository::Backend;

/// Application state; a snapshot is what subscribers render
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AppState {
    /// Boards of the signed-in user
    pub boards: Vec<Board>,
    /// Lists of the open board, ordered by position
    pub lists: Vec<List>,
    /// Cards of those lists, ordered by position
    pub cards: Vec<Card>,
    pub selected_board_id: Option<String>,
    pub selected_board_title: Option<String>,
}

impl AppState {
    pub fn list_ids(&self) -> Vec<String> {
        self.lists.iter().map(|l| l.id.clone()).collect()
    }

    pub fn selected_board(&self) -> Option<&Board> {
        let id = self.selected_board_id.as_deref()?;
        self.boards.iter().find(|b| b.id == id)
    }

    pub fn list(&self, id: &str) -> Option<&List> {
        self.lists.iter().find(|l| l.id == id)
    }

    pub fn card(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Cards of one list, ascending by position
    pub fn cards_in(&self, list_id: &str) -> Vec<&Card> {
        let mut cards: Vec<&Card> = self.cards.iter().filter(|c| c.list_id == list_id).collect();
        cards.sort_by_key(|c| c.position);
        cards
    }

    /// Cards of one list whose title contains `query`, ignoring case
    pub fn search_cards(&self, list_id: &str, query: &str) -> Vec<&Card> {
        self.cards_in(list_id)
            .into_iter()
            .filter(|c| c.matches(query))
            .collect()
    }

    fn clear_board(&mut self) {
        self.selected_board_id = None;
        self.selected_board_title = None;
        self.lists.clear();
        self.cards.clear();
    }
}

/// Store tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    pub max_title_len: usize,
    pub card_reorder: ReorderPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_title_len: DEFAULT_MAX_TITLE_LEN,
            card_reorder: ReorderPolicy::default(),
        }
    }
}

impl From<&KanbanConfig> for StoreOptions {
    fn from(config: &KanbanConfig) -> Self {
        Self {
            max_title_len: config.max_title_len,
            card_reorder: config.card_reorder,
        }
    }
}

/// Version stamps of one collection.
/// A fetch result is applied only if no newer fetch was applied before it.
#[derive(Default)]
struct Stamp {
    issued: AtomicU64,
    applied: AtomicU64,
}

impl Stamp {
    fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn try_apply(&self, version: u64) -> bool {
        self.applied.fetch_max(version, Ordering::SeqCst) < version
    }

    /// Make every fetch issued so far stale
    fn invalidate(&self) {
        let version = self.issue();
        self.applied.fetch_max(version, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Stamps {
    boards: Stamp,
    lists: Stamp,
    cards: Stamp,
}

/// The board store
pub struct BoardStore {
    state: watch::Sender<AppState>,
    stamps: Stamps,
    options: StoreOptions,
    boards: BoardCommands,
    lists: ListCommands,
    cards: CardCommands,
    comments: CommentCommands,
    avatars: AvatarCommands,
}

impl BoardStore {
    pub fn new(backend: &Backend, avatar_bucket: &str, options: StoreOptions) -> Self {
        let (state, _) = watch::channel(AppState::default());
        Self {
            state,
            stamps: Stamps::default(),
            options,
            boards: BoardCommands::new(backend.rows.clone(), options.max_title_len),
            lists: ListCommands::new(backend.rows.clone(), options.max_title_len),
            cards: CardCommands::new(backend.rows.clone(), options.max_title_len),
            comments: CommentCommands::new(backend.rows.clone()),
            avatars: AvatarCommands::new(backend.blobs.clone(), avatar_bucket),
        }
    }

    pub fn from_config(backend: &Backend, config: &KanbanConfig) -> Self {
        Self::new(backend, &config.avatar_bucket, StoreOptions::from(config))
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Current state
    pub fn snapshot(&self) -> AppState {
        self.state.borrow().clone()
    }

    /// Receiver notified after every state change
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    pub fn board_status(&self) -> watch::Receiver<GatewayStatus> {
        self.boards.subscribe()
    }

    pub fn list_status(&self) -> watch::Receiver<GatewayStatus> {
        self.lists.subscribe()
    }

    pub fn card_status(&self) -> watch::Receiver<GatewayStatus> {
        self.cards.subscribe()
    }

    pub fn comment_status(&self) -> watch::Receiver<GatewayStatus> {
        self.comments.subscribe()
    }

    pub fn avatar_status(&self) -> watch::Receiver<GatewayStatus> {
        self.avatars.subscribe()
    }

    // ========================
    // Fetches
    // ========================

    /// Replace `boards` with the user's boards
    pub async fn fetch_boards(&self, user_id: &str) -> DomainResult<()> {
        let version = self.stamps.boards.issue();
        let boards = self.boards.fetch_all(user_id).await?;
        log::debug!("Fetched {} boards for {}", boards.len(), user_id);
        self.state.send_if_modified(|s| {
            if self.stamps.boards.try_apply(version) {
                s.boards = boards;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    /// Replace `lists` with the board's lists
    pub async fn fetch_lists(&self, board_id: &str) -> DomainResult<()> {
        let version = self.stamps.lists.issue();
        let lists = self.lists.fetch_all(board_id).await?;
        log::debug!("Fetched {} lists for board {}", lists.len(), board_id);
        self.state.send_if_modified(|s| {
            if self.stamps.lists.try_apply(version) {
                s.lists = lists;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    /// Replace `cards` with the cards of `list_ids`; no ids clears `cards`
    pub async fn fetch_cards(&self, list_ids: &[String]) -> DomainResult<()> {
        let version = self.stamps.cards.issue();
        let cards = self.cards.fetch_all(list_ids).await?;
        log::debug!("Fetched {} cards for {} lists", cards.len(), list_ids.len());
        self.state.send_if_modified(|s| {
            if self.stamps.cards.try_apply(version) {
                s.cards = cards;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    /// Refetch cards of the lists currently in the store
    async fn refresh_cards(&self) -> DomainResult<()> {
        let list_ids = self.state.borrow().list_ids();
        self.fetch_cards(&list_ids).await
    }

    // ========================
    // Boards
    // ========================

    pub async fn add_board(&self, title: &str, user_id: &str) -> DomainResult<Board> {
        let board = self.boards.create(title, user_id).await?;
        self.fetch_boards(user_id).await?;
        Ok(board)
    }

    pub async fn update_board(&self, id: &str, title: &str, user_id: &str) -> DomainResult<()> {
        self.boards.update(id, BoardPatch::title(title), user_id).await?;
        self.fetch_boards(user_id).await?;
        self.state.send_if_modified(|s| {
            let renamed = s
                .boards
                .iter()
                .find(|b| b.id == id && s.selected_board_id.as_deref() == Some(id))
                .map(|b| b.title.clone());
            match renamed {
                Some(title) if s.selected_board_title.as_deref() != Some(title.as_str()) => {
                    s.selected_board_title = Some(title);
                    true
                }
                _ => false,
            }
        });
        Ok(())
    }

    pub async fn set_board_favorite(&self, id: &str, favorite: bool, user_id: &str) -> DomainResult<()> {
        self.boards.update(id, BoardPatch::favorite(favorite), user_id).await?;
        self.fetch_boards(user_id).await
    }

    /// Delete a board; deselects it (dropping its lists and cards) if it was open
    pub async fn remove_board(&self, id: &str, user_id: &str) -> DomainResult<()> {
        self.boards.delete(id, user_id).await?;
        let was_selected = self.state.borrow().selected_board_id.as_deref() == Some(id);
        if was_selected {
            self.stamps.lists.invalidate();
            self.stamps.cards.invalidate();
            self.state.send_modify(AppState::clear_board);
        }
        self.fetch_boards(user_id).await
    }

    /// Pure view-state change; no backend call
    pub fn set_selected_board_id(&self, board_id: Option<String>, board_title: Option<String>) {
        self.state.send_modify(|s| {
            s.selected_board_id = board_id;
            s.selected_board_title = board_title;
        });
    }

    /// Select a board and load its lists and cards
    pub async fn open_board(&self, board_id: &str, board_title: &str) -> DomainResult<()> {
        self.set_selected_board_id(Some(board_id.to_string()), Some(board_title.to_string()));
        self.fetch_lists(board_id).await?;
        self.refresh_cards().await
    }

    // ========================
    // Lists
    // ========================

    pub async fn add_list(&self, title: &str, board_id: &str, position: i64) -> DomainResult<List> {
        let list = self.lists.create(title, board_id, position).await?;
        self.fetch_lists(board_id).await?;
        Ok(list)
    }

    pub async fn update_list(&self, id: &str, title: &str, board_id: &str) -> DomainResult<()> {
        self.lists.update(id, ListPatch::title(title), board_id).await?;
        self.fetch_lists(board_id).await
    }

    /// Reposition a list of the open board; a list not loaded in `lists` is `NotFound`
    pub async fn update_list_position(&self, id: &str, position: i64) -> DomainResult<()> {
        let board_id = self.board_of_list(id)?;
        self.lists.update(id, ListPatch::position(position), &board_id).await?;
        self.fetch_lists(&board_id).await
    }

    /// Delete a list; refetches lists, then cards of the remaining lists
    pub async fn remove_list(&self, id: &str, board_id: &str) -> DomainResult<()> {
        self.lists.delete(id, board_id).await?;
        self.fetch_lists(board_id).await?;
        self.refresh_cards().await
    }

    fn board_of_list(&self, list_id: &str) -> DomainResult<String> {
        self.state
            .borrow()
            .list(list_id)
            .map(|l| l.board_id.clone())
            .ok_or_else(|| DomainError::NotFound(format!("List {}", list_id)))
    }

    // ========================
    // Cards
    // ========================

    pub async fn add_card(&self, title: &str, list_id: &str, position: i64) -> DomainResult<Card> {
        let card = self.cards.create(title, list_id, position, None).await?;
        let mut list_ids = self.state.borrow().list_ids();
        if !list_ids.iter().any(|id| id == list_id) {
            list_ids.push(list_id.to_string());
        }
        self.fetch_cards(&list_ids).await?;
        Ok(card)
    }

    pub async fn update_card(&self, id: &str, title: &str) -> DomainResult<()> {
        let scope = self.state.borrow().list_ids();
        self.cards.update(id, CardPatch::title(title), &scope).await?;
        self.fetch_cards(&scope).await
    }

    pub async fn update_card_position(&self, id: &str, list_id: &str, position: i64) -> DomainResult<()> {
        let scope = self.state.borrow().list_ids();
        self.cards.update(id, CardPatch::moved(list_id, position), &scope).await?;
        self.fetch_cards(&scope).await
    }

    pub async fn remove_card(&self, id: &str) -> DomainResult<()> {
        let scope = self.state.borrow().list_ids();
        self.cards.delete(id, &scope).await?;
        self.fetch_cards(&scope).await
    }

    /// One card with its details, straight from the backend
    pub async fn fetch_card_details(&self, id: &str) -> DomainResult<Option<Card>> {
        self.cards.fetch_one(id).await
    }

    pub async fn update_card_details(
        &self,
        id: &str,
        description: &str,
        attachments: Vec<String>,
    ) -> DomainResult<()> {
        let scope = self.state.borrow().list_ids();
        self.cards
            .update(id, CardPatch::details(description, attachments), &scope)
            .await?;
        self.fetch_cards(&scope).await
    }

    // ========================
    // Comments and avatars
    // ========================

    pub async fn fetch_comments(&self, card_id: &str) -> DomainResult<Vec<Comment>> {
        self.comments.fetch_for_card(card_id).await
    }

    pub async fn add_comment(&self, card_id: &str, user_id: &str, text: &str) -> DomainResult<Comment> {
        self.comments.add(card_id, user_id, text).await
    }

    pub async fn upload_avatar(&self, user_id: &str, file_name: &str, bytes: Vec<u8>) -> DomainResult<String> {
        self.avatars.upload(user_id, file_name, bytes).await
    }

    // ========================
    // Reorder
    // ========================

    /// Apply a reorder plan: patch local state, issue the updates in order,
    /// then refetch the affected collection once.
    /// Stops at the first failed update; the refetch still runs.
    pub async fn apply_reorder(&self, plan: ReorderPlan) -> DomainResult<usize> {
        self.state.send_modify(|s| plan.apply_local(s));

        match &plan {
            ReorderPlan::Lists { board_id, updates } => {
                let mut result: DomainResult<usize> = Ok(0);
                for u in updates {
                    if let Err(e) = self.lists.update(&u.id, ListPatch::position(u.position), board_id).await {
                        result = Err(e);
                        break;
                    }
                    result = result.map(|n| n + 1);
                }
                let refetch = self.fetch_lists(board_id).await;
                let applied = result?;
                refetch?;
                Ok(applied)
            }
            ReorderPlan::Cards { updates } => {
                let mut scope = self.state.borrow().list_ids();
                for u in updates {
                    if let Some(list_id) = &u.list_id {
                        if !scope.contains(list_id) {
                            scope.push(list_id.clone());
                        }
                    }
                }
                let mut result: DomainResult<usize> = Ok(0);
                for u in updates {
                    let patch = CardPatch {
                        list_id: u.list_id.clone(),
                        position: Some(u.position),
                        ..CardPatch::default()
                    };
                    if let Err(e) = self.cards.update(&u.id, patch, &scope).await {
                        result = Err(e);
                        break;
                    }
                    result = result.map(|n| n + 1);
                }
                let refetch = self.refresh_cards().await;
                let applied = result?;
                refetch?;
                Ok(applied)
            }
        }
    }

    /// Drop everything, e.g. on sign-out. In-flight fetches are discarded.
    pub fn reset(&self) {
        self.stamps.boards.invalidate();
        self.stamps.lists.invalidate();
        self.stamps.cards.invalidate();
        self.state.send_replace(AppState::default());
    }
}
