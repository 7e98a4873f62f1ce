//! 认证相关的 HTTP 处理器

use crate::{auth::middleware::AuthContext, error::AppError, middleware::AppState, models::auth::*};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;

    let response = state.auth_service.register(req).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;

    let response = state.auth_service.login(req).await?;

    Ok(Json(ApiResponse::ok(response)))
}

/// 自动登录（刷新访问令牌）
pub async fn auto_login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AutoLoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload?;

    let response = state.auth_service.auto_login(req).await?;

    Ok(Json(ApiResponse::ok(response)))
}

/// 登出，吊销该用户的全部刷新令牌
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.logout(auth_context.user_id).await?;

    Ok(Json(MessageResponse::ok("Logged out successfully")))
}

/// 获取当前用户信息
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth_service.current_user(auth_context.user_id).await?;

    Ok(Json(ApiResponse::ok(user)))
}
