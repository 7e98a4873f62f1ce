//! 认证服务：注册、登录、自动登录、登出

use crate::{
    auth::{
        jwt::JwtService,
        password::{PasswordError, PasswordHasher},
    },
    config::SecurityConfig,
    error::AppError,
    models::{auth::*, user::*},
    repository::{AuthStore, SessionStore, UserStore},
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct AuthService {
    store: Arc<dyn AuthStore>,
    jwt_service: Arc<JwtService>,
    hasher: Arc<PasswordHasher>,
    security: SecurityConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        jwt_service: Arc<JwtService>,
        hasher: Arc<PasswordHasher>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            store,
            jwt_service,
            hasher,
            security,
        }
    }

    /// 用户注册
    ///
    /// 用户行与刷新令牌行在同一事务中写入，任何一步失败都整体回滚。
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, AppError> {
        req.validate()?;
        PasswordHasher::validate_password_policy(&req.password, &self.security)?;

        let email = normalize_email(&req.email);
        let username = req.username.trim().to_string();

        // 哈希在事务外完成，避免长时间占用连接
        let password_hash = self.hash_password(req.password).await?;

        let mut tx = self.store.begin().await?;

        if tx.user_exists(&email, &username).await? {
            tracing::debug!(%username, "Registration rejected: user already exists");
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let user = tx
            .create_user(NewUser {
                username,
                email,
                password_hash,
                name: req.name.trim().to_string(),
                surname: req.surname.trim().to_string(),
            })
            .await?;

        let tokens = self.jwt_service.issue_tokens(&user.id)?;

        tx.save_session(user.id, &tokens.refresh_token, tokens.refresh_expires_at)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(AuthResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            user: UserResponse::from(user),
        })
    }

    /// 用户登录
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AppError> {
        req.validate()?;

        let email = normalize_email(&req.email);

        // 获取用户
        let user: User = match self.store.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                tracing::debug!("Login rejected: unknown email");
                return Err(AppError::Unauthorized);
            }
        };

        // 验证密码
        if let Err(e) = self.verify_password(req.password, user.password_hash.clone()).await? {
            match e {
                PasswordError::Mismatch => {
                    tracing::debug!(user_id = %user.id, "Login rejected: wrong password")
                }
                other => {
                    tracing::warn!(user_id = %user.id, error = %other, "Password verification failed")
                }
            }
            return Err(AppError::Unauthorized);
        }

        // 顺带清理过期会话，失败不影响登录
        if let Err(e) = self.store.prune_expired(user.id).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to prune expired sessions");
        }

        // 生成令牌并存储刷新令牌
        let tokens = self.jwt_service.issue_tokens(&user.id)?;
        self.store
            .save(user.id, &tokens.refresh_token, tokens.refresh_expires_at)
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(AuthResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            user: UserResponse::from(user),
        })
    }

    /// 自动登录：用刷新令牌换取新的访问令牌
    ///
    /// 刷新令牌不轮换，原样返回。
    pub async fn auto_login(&self, req: AutoLoginRequest) -> Result<AuthResponse, AppError> {
        req.validate()?;

        // 验证刷新令牌签名与过期时间
        let claims = self
            .jwt_service
            .validate_refresh_token(&req.token)
            .map_err(|_| AppError::authentication("Invalid token"))?;

        let user_id = JwtService::extract_user_id(&claims)
            .map_err(|_| AppError::authentication("Invalid token content"))?;

        // 会话行必须存在
        let session = match self.store.find_valid(&req.token, user_id).await {
            Ok(session) => session,
            Err(AppError::NotFound(_)) => {
                tracing::debug!(%user_id, "Auto-login rejected: session not found");
                return Err(AppError::authentication("Session not found"));
            }
            Err(e) => return Err(e),
        };

        // 以会话行的过期时间为准
        if session.is_expired() {
            tracing::debug!(%user_id, "Auto-login rejected: session expired");
            return Err(AppError::authentication("Session expired"));
        }

        // 获取用户
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let access_token = self.jwt_service.issue_access_token(&user.id)?;

        tracing::info!(user_id = %user.id, "User auto-logged in");

        Ok(AuthResponse {
            access_token,
            refresh_token: req.token,
            expires_in: self.jwt_service.access_token_exp_secs(),
            user: UserResponse::from(user),
        })
    }

    /// 登出：删除用户的所有刷新令牌
    pub async fn logout(&self, user_id: Uuid) -> Result<u64, AppError> {
        let revoked = self.store.delete_all_for_user(user_id).await.map_err(|e| {
            tracing::error!(%user_id, error = %e, "Failed to revoke sessions");
            AppError::internal_error("Failed to log out")
        })?;

        tracing::info!(%user_id, revoked, "User logged out");
        Ok(revoked)
    }

    /// 当前用户信息
    pub async fn current_user(&self, user_id: Uuid) -> Result<UserResponse, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(UserResponse::from)
            .ok_or(AppError::Unauthorized)
    }

    /// 在阻塞线程池上计算密码哈希
    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let hashed = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?;

        hashed.map_err(|e| match e {
            PasswordError::EmptyInput => AppError::validation("Password must not be empty"),
            other => {
                tracing::error!(error = %other, "Password hashing failed");
                AppError::Internal(other.to_string())
            }
        })
    }

    /// 在阻塞线程池上校验密码，外层错误只表示任务本身失败
    async fn verify_password(
        &self,
        password: String,
        hash: String,
    ) -> Result<Result<(), PasswordError>, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))
    }
}

/// 邮箱比较不区分大小写
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
