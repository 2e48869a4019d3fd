//! Session Context
//!
//! Ties the auth provider to the board store: the signed-in user's boards
//! are loaded on every session change and the store is cleared on logout.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::domain::{DomainError, DomainResult, Session};
use crate::repository::AuthProvider;
use crate::store::BoardStore;

#[derive(Clone)]
pub struct SessionContext {
    auth: Arc<dyn AuthProvider>,
    store: Arc<BoardStore>,
}

impl SessionContext {
    pub fn new(auth: Arc<dyn AuthProvider>, store: Arc<BoardStore>) -> Self {
        Self { auth, store }
    }

    pub fn store(&self) -> &Arc<BoardStore> {
        &self.store
    }

    pub fn auth(&self) -> &Arc<dyn AuthProvider> {
        &self.auth
    }

    /// Signed-in user id; `None` means not authenticated, skip fetching
    pub fn user_id(&self) -> Option<String> {
        self.auth.current_session().map(|s| s.user.id)
    }

    pub fn require_user(&self) -> DomainResult<String> {
        self.user_id()
            .ok_or_else(|| DomainError::Auth("Sign in to continue".into()))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> DomainResult<Session> {
        self.auth.sign_in(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> DomainResult<Option<Session>> {
        self.auth.sign_up(email, password).await
    }

    /// Sign out and drop all board state
    pub async fn sign_out(&self) -> DomainResult<()> {
        let result = self.auth.sign_out().await;
        self.store.reset();
        result
    }

    /// Follow session changes in the background.
    /// A new user gets their boards fetched; logout resets the store.
    /// The task ends when the auth provider is dropped.
    pub fn spawn_board_sync(&self) -> JoinHandle<()> {
        let mut sessions = self.auth.subscribe();
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut current: Option<String> = None;
            loop {
                let user_id = sessions.borrow_and_update().as_ref().map(|s| s.user.id.clone());
                match &user_id {
                    Some(id) if current.as_deref() != Some(id.as_str()) => {
                        log::info!("Session user {}, loading boards", id);
                        if current.is_some() {
                            store.reset();
                        }
                        if let Err(e) = store.fetch_boards(id).await {
                            log::warn!("Loading boards for {} failed: {}", id, e);
                        }
                    }
                    Some(_) => {
                        // Token refresh for the same user
                    }
                    None if current.is_some() => {
                        log::info!("Signed out, clearing board state");
                        store.reset();
                    }
                    None => {}
                }
                current = user_id;

                if sessions.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Backend;
    use crate::store::StoreOptions;
    use std::time::Duration;

    fn context() -> (SessionContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Backend::in_memory(dir.path()).unwrap();
        let store = Arc::new(BoardStore::new(&backend, "avatars", StoreOptions::default()));
        (SessionContext::new(backend.auth.clone(), store), dir)
    }

    async fn wait_for<F: Fn() -> bool>(check: F) {
        for _ in 0..100 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_require_user_without_session() {
        let (ctx, _dir) = context();
        assert!(ctx.user_id().is_none());
        assert!(matches!(ctx.require_user(), Err(DomainError::Auth(_))));
    }

    #[tokio::test]
    async fn test_sync_loads_boards_and_resets_on_logout() {
        let (ctx, _dir) = context();
        let session = ctx.sign_up("ann@example.com", "secret1").await.unwrap().unwrap();
        let user_id = session.user_id().to_string();
        ctx.store().add_board("Work", &user_id).await.unwrap();
        ctx.sign_out().await.unwrap();
        assert!(ctx.store().snapshot().boards.is_empty());

        let sync = ctx.spawn_board_sync();
        ctx.sign_in("ann@example.com", "secret1").await.unwrap();
        assert_eq!(ctx.require_user().unwrap(), user_id);

        let store = ctx.store().clone();
        wait_for(|| store.snapshot().boards.len() == 1).await;

        ctx.auth().sign_out().await.unwrap();
        wait_for(|| store.snapshot().boards.is_empty()).await;
        sync.abort();
    }
}
