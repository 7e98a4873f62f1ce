//! User repository (数据库访问层)

use crate::{
    error::AppError,
    models::user::{NewUser, User},
    repository::UserStore,
};
use async_trait::async_trait;
use sqlx::{postgres::PgExecutor, PgPool};
use uuid::Uuid;

pub struct UserRepository {
    db: PgPool,
}

impl UserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 根据邮箱查找用户
    pub(crate) async fn select_by_email<'e, E>(
        executor: E,
        email: &str,
    ) -> Result<Option<User>, AppError>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, name, surname, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// 根据 ID 查找用户
    pub(crate) async fn select_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<User>, AppError>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, name, surname, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    /// 邮箱或用户名是否已被占用
    pub(crate) async fn exists_by_email_or_username<'e, E>(
        executor: E,
        email: &str,
        username: &str,
    ) -> Result<bool, AppError>
    where
        E: PgExecutor<'e>,
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 OR username = $2)",
        )
        .bind(email)
        .bind(username)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    /// 创建用户
    pub(crate) async fn insert<'e, E>(executor: E, new_user: NewUser) -> Result<User, AppError>
    where
        E: PgExecutor<'e>,
    {
        let user = new_user.into_user();

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, name, surname, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, password_hash, name, surname, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.surname)
        .bind(user.created_at)
        .fetch_one(executor)
        .await
        .map_err(|e| match e {
            // 并发注册在唯一约束上冲突
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("User already exists".to_string())
            }
            other => AppError::Database(other),
        })?;

        Ok(created)
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Self::select_by_email(&self.db, email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Self::select_by_id(&self.db, id).await
    }
}
