//! Refresh token repository (会话数据访问)

use crate::{
    error::AppError,
    models::session::RefreshToken,
    repository::{hash_token, SessionStore},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgExecutor, PgPool};
use uuid::Uuid;

pub struct SessionRepository {
    db: PgPool,
}

impl SessionRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 存储刷新令牌
    pub(crate) async fn insert<'e, E>(
        executor: E,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError>
    where
        E: PgExecutor<'e>,
    {
        let row = RefreshToken::new(user_id, hash_token(token), expires_at);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(row.id)
        .bind(row.user_id)
        .bind(&row.token_hash)
        .bind(row.expires_at)
        .bind(row.created_at)
        .execute(executor)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn save(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, AppError> {
        Self::insert(&self.db, user_id, token, expires_at).await
    }

    async fn find_valid(&self, token: &str, user_id: Uuid) -> Result<RefreshToken, AppError> {
        sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, created_at
            FROM refresh_tokens
            WHERE token_hash = $1 AND user_id = $2
            "#,
        )
        .bind(hash_token(token))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("refresh token"))
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn prune_expired(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1 AND expires_at < NOW()")
                .bind(user_id)
                .execute(&self.db)
                .await?;

        Ok(result.rows_affected())
    }
}
