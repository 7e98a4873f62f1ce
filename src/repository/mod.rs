//! Database repository layer
//!
//! The auth service only sees the traits below; `PgAuthStore` backs them with
//! PostgreSQL and `MemoryAuthStore` keeps everything in process.

use crate::{
    error::AppError,
    models::{
        session::RefreshToken,
        user::{NewUser, User},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub mod memory;
pub mod pg_store;
pub mod session_repo;
pub mod user_repo;

pub use memory::MemoryAuthStore;
pub use pg_store::PgAuthStore;
pub use session_repo::SessionRepository;
pub use user_repo::UserRepository;

/// User lookups
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
}

/// Refresh token persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a refresh token row
    async fn save(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError>;

    /// Row matching `(token, user_id)` regardless of expiry, `NotFound` otherwise
    async fn find_valid(&self, token: &str, user_id: Uuid) -> Result<RefreshToken, AppError>;

    /// Delete every row of the user; zero rows is not an error
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;

    /// Delete the user's rows with `expires_at < now`
    async fn prune_expired(&self, user_id: Uuid) -> Result<u64, AppError>;
}

/// Store used by the auth service, with scoped transactions for registration
#[async_trait]
pub trait AuthStore: UserStore + SessionStore {
    /// Begin a transaction. Dropping it without `commit` rolls back.
    async fn begin(&self) -> Result<Box<dyn AuthTransaction>, AppError>;

    /// Readiness probe
    async fn health_check(&self) -> Result<(), AppError>;
}

/// Writes that must become visible together or not at all
#[async_trait]
pub trait AuthTransaction: Send {
    /// Whether a user already owns this e-mail or username
    async fn user_exists(&mut self, email: &str, username: &str) -> Result<bool, AppError>;

    async fn create_user(&mut self, user: NewUser) -> Result<User, AppError>;

    async fn save_session(
        &mut self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}

/// 哈希令牌用于存储
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
