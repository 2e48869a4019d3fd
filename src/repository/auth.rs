//! Auth Providers
//!
//! - `SupabaseAuth`: password auth against the hosted service (`/auth/v1`)
//! - `LocalAuth`: in-process accounts for the embedded backend

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::watch;

use super::rest_store::{handle_response, request_error, SupabaseClient};
use super::traits::AuthProvider;
use crate::domain::{DomainError, DomainResult, Session, User};

/// Token endpoint payload
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<User>,
}

impl TokenResponse {
    /// None when the response carries no token (e.g. sign-up awaiting confirmation)
    fn into_session(self) -> Option<Session> {
        let access_token = self.access_token?;
        let user = self.user?;
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| chrono::Utc::now().timestamp() + secs));
        Some(Session {
            access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user,
        })
    }
}

/// Password auth against the hosted service.
/// Shares its session slot with the client, so row requests carry the token.
pub struct SupabaseAuth {
    client: SupabaseClient,
}

impl SupabaseAuth {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn token_request(&self, grant_type: &str, body: serde_json::Value) -> DomainResult<TokenResponse> {
        let what = format!("auth token ({})", grant_type);
        let request = self
            .client
            .http()
            .post(self.client.url("/auth/v1/token"))
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let response = self
            .client
            .anonymous(request)
            .send()
            .await
            .map_err(|e| request_error(e, &what))?;
        let body = handle_response(response, &what).await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn publish(&self, session: Option<Session>) {
        self.client.session().send_replace(session);
    }

    /// Exchange the refresh token for a new session and publish it
    pub async fn refresh_session(&self) -> DomainResult<Session> {
        let refresh_token = self
            .current_session()
            .and_then(|s| s.refresh_token)
            .ok_or_else(|| DomainError::Auth("No session to refresh".into()))?;

        let session = self
            .token_request("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?
            .into_session()
            .ok_or_else(|| DomainError::Auth("Refresh returned no session".into()))?;

        log::info!("Session refreshed for user {}", session.user_id());
        self.publish(Some(session.clone()));
        Ok(session)
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    fn current_session(&self) -> Option<Session> {
        self.client.session().borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.client.session().subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> DomainResult<Session> {
        let session = self
            .token_request("password", json!({ "email": email, "password": password }))
            .await?
            .into_session()
            .ok_or_else(|| DomainError::Auth("Sign-in returned no session".into()))?;

        log::info!("Signed in as {}", session.user_id());
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> DomainResult<Option<Session>> {
        let what = "auth signup";
        let request = self
            .client
            .http()
            .post(self.client.url("/auth/v1/signup"))
            .json(&json!({ "email": email, "password": password }));
        let response = self
            .client
            .anonymous(request)
            .send()
            .await
            .map_err(|e| request_error(e, what))?;
        let body = handle_response(response, what).await?;
        let token: TokenResponse = serde_json::from_str(&body)?;

        let session = token.into_session();
        match &session {
            Some(s) => {
                log::info!("Signed up and signed in as {}", s.user_id());
                self.publish(Some(s.clone()));
            }
            None => log::info!("Signed up {}, awaiting email confirmation", email),
        }
        Ok(session)
    }

    async fn sign_out(&self) -> DomainResult<()> {
        let what = "auth logout";
        let result = match self.current_session() {
            Some(_) => {
                let request = self.client.http().post(self.client.url("/auth/v1/logout"));
                match self.client.authorized(request).send().await {
                    Ok(response) => handle_response(response, what).await.map(|_| ()),
                    Err(e) => Err(request_error(e, what)),
                }
            }
            None => Ok(()),
        };
        // The local session is dropped even if the server call failed
        self.publish(None);
        if let Err(e) = &result {
            log::warn!("Sign-out request failed: {}", e);
        }
        result
    }
}

struct LocalAccount {
    user: User,
    password_hash: blake3::Hash,
}

/// In-process accounts for the embedded backend.
/// Accounts live as long as the provider; passwords are kept as salted blake3 hashes.
pub struct LocalAuth {
    accounts: Mutex<HashMap<String, LocalAccount>>,
    session: watch::Sender<Option<Session>>,
}

impl Default for LocalAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuth {
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session,
        }
    }

    fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    fn hash(email: &str, password: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(email.as_bytes());
        hasher.update(&[0]);
        hasher.update(password.as_bytes());
        hasher.finalize()
    }

    fn new_session(user: User) -> Session {
        Session {
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: None,
            expires_at: None,
            user,
        }
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> DomainResult<Session> {
        let email = Self::normalize_email(email);
        let user = {
            let accounts = self
                .accounts
                .lock()
                .map_err(|_| DomainError::Internal("Account table poisoned".into()))?;
            let account = accounts
                .get(&email)
                .ok_or_else(|| DomainError::Auth("Invalid login credentials".into()))?;
            if account.password_hash != Self::hash(&email, password) {
                return Err(DomainError::Auth("Invalid login credentials".into()));
            }
            account.user.clone()
        };
        let session = Self::new_session(user);
        self.session.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> DomainResult<Option<Session>> {
        let email = Self::normalize_email(email);
        if !email.contains('@') {
            return Err(DomainError::InvalidInput("A valid email is required".into()));
        }
        if password.chars().count() < 6 {
            return Err(DomainError::InvalidInput("Password must be at least 6 characters".into()));
        }
        let user = {
            let mut accounts = self
                .accounts
                .lock()
                .map_err(|_| DomainError::Internal("Account table poisoned".into()))?;
            if accounts.contains_key(&email) {
                return Err(DomainError::Conflict("User already registered".into()));
            }
            let user = User {
                id: uuid::Uuid::new_v4().to_string(),
                email: Some(email.clone()),
            };
            accounts.insert(
                email.clone(),
                LocalAccount {
                    user: user.clone(),
                    password_hash: Self::hash(&email, password),
                },
            );
            user
        };
        let session = Self::new_session(user);
        self.session.send_replace(Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> DomainResult<()> {
        self.session.send_replace(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_sign_up_then_sign_in() {
        let auth = LocalAuth::new();
        let created = auth.sign_up("Ann@Example.com", "secret1").await.unwrap().unwrap();
        auth.sign_out().await.unwrap();
        assert!(auth.current_session().is_none());

        let session = auth.sign_in("ann@example.com ", "secret1").await.unwrap();
        assert_eq!(session.user_id(), created.user_id());
        assert_eq!(auth.current_session().unwrap().user_id(), created.user_id());
    }

    #[tokio::test]
    async fn test_local_rejects_bad_password() {
        let auth = LocalAuth::new();
        auth.sign_up("a@b.c", "secret1").await.unwrap();
        auth.sign_out().await.unwrap();
        assert!(matches!(auth.sign_in("a@b.c", "wrong!!").await, Err(DomainError::Auth(_))));
        assert!(matches!(auth.sign_in("nobody@b.c", "secret1").await, Err(DomainError::Auth(_))));
    }

    #[tokio::test]
    async fn test_local_duplicate_and_weak_signups() {
        let auth = LocalAuth::new();
        auth.sign_up("a@b.c", "secret1").await.unwrap();
        assert!(matches!(auth.sign_up("A@B.C", "secret2").await, Err(DomainError::Conflict(_))));
        assert!(matches!(auth.sign_up("x@y.z", "123").await, Err(DomainError::InvalidInput(_))));
        assert!(matches!(auth.sign_up("not-an-email", "secret1").await, Err(DomainError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let auth = LocalAuth::new();
        let mut rx = auth.subscribe();
        auth.sign_up("a@b.c", "secret1").await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());

        auth.sign_out().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn test_token_response_into_session() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"t","refresh_token":"r","expires_at":100,"user":{"id":"u1","email":"a@b.c"}}"#,
        )
        .unwrap();
        let session = token.into_session().unwrap();
        assert_eq!(session.user_id(), "u1");
        assert_eq!(session.expires_at, Some(100));

        let pending: TokenResponse = serde_json::from_str(r#"{"id":"u1","email":"a@b.c"}"#).unwrap();
        assert!(pending.into_session().is_none());
    }
}
