//! PostgreSQL-backed auth store

use crate::{
    db,
    error::AppError,
    models::{
        session::RefreshToken,
        user::{NewUser, User},
    },
    repository::{
        AuthStore, AuthTransaction, SessionRepository, SessionStore, UserRepository, UserStore,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub struct PgAuthStore {
    db: PgPool,
    users: UserRepository,
    sessions: SessionRepository,
}

impl PgAuthStore {
    pub fn new(db: PgPool) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            sessions: SessionRepository::new(db.clone()),
            db,
        }
    }
}

#[async_trait]
impl UserStore for PgAuthStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.users.find_by_email(email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.users.find_by_id(id).await
    }
}

#[async_trait]
impl SessionStore for PgAuthStore {
    async fn save(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError> {
        self.sessions.save(user_id, token, expires_at).await
    }

    async fn find_valid(&self, token: &str, user_id: Uuid) -> Result<RefreshToken, AppError> {
        self.sessions.find_valid(token, user_id).await
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.sessions.delete_all_for_user(user_id).await
    }

    async fn prune_expired(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.sessions.prune_expired(user_id).await
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn begin(&self) -> Result<Box<dyn AuthTransaction>, AppError> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgAuthTransaction { tx }))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        match db::health_check(&self.db).await {
            db::HealthStatus::Healthy => Ok(()),
            db::HealthStatus::Unhealthy(msg) => Err(AppError::Internal(msg)),
        }
    }
}

/// sqlx rolls the transaction back when it is dropped uncommitted
pub struct PgAuthTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AuthTransaction for PgAuthTransaction {
    async fn user_exists(&mut self, email: &str, username: &str) -> Result<bool, AppError> {
        UserRepository::exists_by_email_or_username(&mut *self.tx, email, username).await
    }

    async fn create_user(&mut self, user: NewUser) -> Result<User, AppError> {
        UserRepository::insert(&mut *self.tx, user).await
    }

    async fn save_session(
        &mut self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError> {
        SessionRepository::insert(&mut *self.tx, user_id, token, expires_at).await
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
