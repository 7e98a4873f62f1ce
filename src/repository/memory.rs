//! In-process auth store
//!
//! Holds users and refresh tokens behind a single async mutex. A transaction
//! keeps the lock until it commits or is dropped, so registrations are
//! serialized the same way a database transaction would serialize them.

use crate::{
    error::AppError,
    models::{
        session::RefreshToken,
        user::{NewUser, User},
    },
    repository::{hash_token, AuthStore, AuthTransaction, SessionStore, UserStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    sessions: Vec<RefreshToken>,
}

impl MemoryState {
    fn user_taken(&self, email: &str, username: &str) -> bool {
        self.users
            .values()
            .any(|u| u.email == email || u.username == username)
    }

    fn token_taken(&self, token_hash: &str) -> bool {
        self.sessions.iter().any(|s| s.token_hash == token_hash)
    }
}

#[derive(Default, Clone)]
pub struct MemoryAuthStore {
    state: Arc<Mutex<MemoryState>>,
    fail_session_writes: Arc<AtomicBool>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent refresh-token insert fail with a storage error
    pub fn fail_session_writes(&self, fail: bool) {
        self.fail_session_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn sessions_for(&self, user_id: Uuid) -> Vec<RefreshToken> {
        self.state
            .lock()
            .await
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Delete a user together with their sessions
    pub async fn remove_user(&self, user_id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        state.sessions.retain(|s| s.user_id != user_id);
        state.users.remove(&user_id).is_some()
    }

    /// Insert a raw session row as-is
    pub async fn insert_row(&self, row: RefreshToken) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.token_taken(&row.token_hash) {
            return Err(AppError::internal_error("duplicate refresh token"));
        }
        state.sessions.push(row);
        Ok(())
    }

    fn check_session_writes(&self) -> Result<(), AppError> {
        if self.fail_session_writes.load(Ordering::SeqCst) {
            return Err(AppError::internal_error("session storage unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryAuthStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl SessionStore for MemoryAuthStore {
    async fn save(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError> {
        self.check_session_writes()?;
        let row = RefreshToken::new(user_id, hash_token(token), expires_at);
        self.insert_row(row.clone()).await?;
        Ok(row)
    }

    async fn find_valid(&self, token: &str, user_id: Uuid) -> Result<RefreshToken, AppError> {
        let token_hash = hash_token(token);
        let state = self.state.lock().await;
        state
            .sessions
            .iter()
            .find(|s| s.token_hash == token_hash && s.user_id == user_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("refresh token"))
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|s| s.user_id != user_id);
        Ok((before - state.sessions.len()) as u64)
    }

    async fn prune_expired(&self, user_id: Uuid) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state
            .sessions
            .retain(|s| s.user_id != user_id || s.expires_at >= now);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn begin(&self) -> Result<Box<dyn AuthTransaction>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            guard,
            users: Vec::new(),
            sessions: Vec::new(),
            fail_session_writes: self.fail_session_writes.load(Ordering::SeqCst),
        }))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Staged writes; applied on commit, discarded on drop
struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    users: Vec<User>,
    sessions: Vec<RefreshToken>,
    fail_session_writes: bool,
}

#[async_trait]
impl AuthTransaction for MemoryTransaction {
    async fn user_exists(&mut self, email: &str, username: &str) -> Result<bool, AppError> {
        Ok(self.guard.user_taken(email, username)
            || self
                .users
                .iter()
                .any(|u| u.email == email || u.username == username))
    }

    async fn create_user(&mut self, user: NewUser) -> Result<User, AppError> {
        if self.user_exists(&user.email, &user.username).await? {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        let user = user.into_user();
        self.users.push(user.clone());
        Ok(user)
    }

    async fn save_session(
        &mut self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError> {
        if self.fail_session_writes {
            return Err(AppError::internal_error("session storage unavailable"));
        }
        let row = RefreshToken::new(user_id, hash_token(token), expires_at);
        if self.guard.token_taken(&row.token_hash)
            || self.sessions.iter().any(|s| s.token_hash == row.token_hash)
        {
            return Err(AppError::internal_error("duplicate refresh token"));
        }
        self.sessions.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTransaction {
            mut guard,
            users,
            sessions,
            ..
        } = *self;
        for user in users {
            guard.users.insert(user.id, user);
        }
        guard.sessions.extend(sessions);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            name: "Test".to_string(),
            surname: "User".to_string(),
        }
    }

    #[tokio::test]
    async fn test_transaction_commit_makes_rows_visible() {
        let store = MemoryAuthStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.create_user(new_user("alice", "alice@x.com")).await.unwrap();
        tx.save_session(user.id, "t1", Utc::now() + Duration::days(1))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.user_count().await, 1);
        assert!(store.find_valid("t1", user.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_transaction_drop_rolls_back() {
        let store = MemoryAuthStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.create_user(new_user("alice", "alice@x.com")).await.unwrap();
        }
        assert_eq!(store.user_count().await, 0);
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_find_valid_ignores_expiry_and_checks_owner() {
        let store = MemoryAuthStore::new();
        let owner = Uuid::new_v4();
        store
            .save(owner, "expired", Utc::now() - Duration::hours(1))
            .await
            .unwrap();

        let row = store.find_valid("expired", owner).await.unwrap();
        assert!(row.is_expired());
        assert!(matches!(
            store.find_valid("expired", Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_all_is_idempotent() {
        let store = MemoryAuthStore::new();
        let user_id = Uuid::new_v4();
        let expiry = Utc::now() + Duration::days(1);
        store.save(user_id, "a", expiry).await.unwrap();
        store.save(user_id, "b", expiry).await.unwrap();
        store.save(Uuid::new_v4(), "c", expiry).await.unwrap();

        assert_eq!(store.delete_all_for_user(user_id).await.unwrap(), 2);
        assert_eq!(store.delete_all_for_user(user_id).await.unwrap(), 0);
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_prune_expired_only_touches_user_rows() {
        let store = MemoryAuthStore::new();
        let user_id = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.save(user_id, "old", Utc::now() - Duration::hours(1)).await.unwrap();
        store.save(user_id, "new", Utc::now() + Duration::hours(1)).await.unwrap();
        store.save(other, "other-old", Utc::now() - Duration::hours(1)).await.unwrap();

        assert_eq!(store.prune_expired(user_id).await.unwrap(), 1);
        assert!(store.find_valid("new", user_id).await.is_ok());
        assert!(store.find_valid("other-old", other).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_token_rejected() {
        let store = MemoryAuthStore::new();
        let user_id = Uuid::new_v4();
        let expiry = Utc::now() + Duration::days(1);
        store.save(user_id, "same", expiry).await.unwrap();
        assert!(store.save(user_id, "same", expiry).await.is_err());
    }
}
