//! 认证 API 集成测试
//! 使用内存存储，通过 Router::oneshot 驱动完整的 HTTP 栈

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{create_test_app, register_body, register_user, send, PASSWORD};

#[tokio::test]
async fn test_register_success() {
    let (app, store) = create_test_app();

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        Some(register_body("alice", "alice@x.com")),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert!(json["data"]["access_token"].is_string());
    assert!(json["data"]["refresh_token"].is_string());
    assert_eq!(json["data"]["expires_in"], 300);
    assert_eq!(json["data"]["user"]["username"], "alice");
    assert_eq!(json["data"]["user"]["email"], "alice@x.com");
    assert!(json["data"]["user"].get("password_hash").is_none());
    assert!(json["data"]["user"].get("password").is_none());

    assert_eq!(store.user_count().await, 1);
    assert_eq!(store.session_count().await, 1);
}

#[tokio::test]
async fn test_register_duplicate_returns_conflict() {
    let (app, store) = create_test_app();
    register_user(&app, "alice", "alice@x.com").await;

    // 相同邮箱
    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        Some(register_body("alice2", "alice@x.com")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], 409);

    // 相同用户名
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        Some(register_body("alice", "other@x.com")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(store.user_count().await, 1);
    assert_eq!(store.session_count().await, 1);
}

#[tokio::test]
async fn test_register_missing_field_returns_bad_request() {
    let (app, store) = create_test_app();

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        Some(json!({
            "username": "alice",
            "email": "alice@x.com",
            "password": PASSWORD,
            "name": "Alice",
        })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], 400);
    assert_eq!(store.user_count().await, 0);
}

#[tokio::test]
async fn test_register_invalid_email_returns_bad_request() {
    let (app, _store) = create_test_app();

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/auth/register",
        Some(register_body("alice", "not-an-email")),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn test_malformed_json_returns_bad_request() {
    let (app, _store) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"email\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_content_type_returns_bad_request() {
    let (app, _store) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .body(Body::from(json!({"email": "a@x.com", "password": "x"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let (app, _store) = create_test_app();
    let body = "x".repeat(128 * 1024);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::CONTENT_LENGTH, body.len())
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_login_success() {
    let (app, store) = create_test_app();
    let registered = register_user(&app, "alice", "alice@x.com").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        Some(json!({"email": "alice@x.com", "password": PASSWORD})),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["user"]["id"], registered["user"]["id"]);
    assert_ne!(json["data"]["refresh_token"], registered["refresh_token"]);

    // 每次登录新增一个会话
    assert_eq!(store.session_count().await, 2);
}

#[tokio::test]
async fn test_login_email_is_case_insensitive() {
    let (app, _store) = create_test_app();
    register_user(&app, "alice", "Alice@X.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        Some(json!({"email": "ALICE@x.COM", "password": PASSWORD})),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let (app, _store) = create_test_app();
    register_user(&app, "alice", "alice@x.com").await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        Some(json!({"email": "alice@x.com", "password": "WrongPassword"})),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], 401);
    assert!(json["error"]["request_id"].is_string());
}

#[tokio::test]
async fn test_login_unknown_user_matches_wrong_password() {
    let (app, _store) = create_test_app();
    register_user(&app, "alice", "alice@x.com").await;

    let (unknown_status, unknown) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        Some(json!({"email": "nobody@x.com", "password": PASSWORD})),
        None,
    )
    .await;
    let (wrong_status, wrong) = send(
        &app,
        "POST",
        "/api/v1/auth/login",
        Some(json!({"email": "alice@x.com", "password": "WrongPassword"})),
        None,
    )
    .await;

    // 不区分“用户不存在”和“密码错误”
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown["error"]["message"], wrong["error"]["message"]);
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    let (app, _store) = create_test_app();

    // 注册 -> T1a, T1r
    let registered = register_user(&app, "alice", "alice@x.com").await;
    let t1_refresh = registered["refresh_token"].as_str().unwrap().to_string();

    // 自动登录 -> 新访问令牌，同一刷新令牌
    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/auth/autologin",
        Some(json!({"token": t1_refresh})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["refresh_token"], t1_refresh.as_str());
    assert_eq!(json["data"]["user"]["username"], "alice");
    let t2_access = json["data"]["access_token"].as_str().unwrap().to_string();
    assert_ne!(t2_access, registered["access_token"].as_str().unwrap());

    // 使用新访问令牌登出
    let (status, json) = send(&app, "POST", "/api/v1/auth/logout", None, Some(&t2_access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["message"].is_string());

    // 刷新令牌已被吊销
    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/auth/autologin",
        Some(json!({"token": t1_refresh})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "Session not found");
}

#[tokio::test]
async fn test_autologin_rejects_access_token() {
    let (app, _store) = create_test_app();
    let registered = register_user(&app, "alice", "alice@x.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/autologin",
        Some(json!({"token": registered["access_token"]})),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_autologin_rejects_garbage() {
    let (app, _store) = create_test_app();

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/autologin",
        Some(json!({"token": "not.a.jwt"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/autologin",
        Some(json!({"token": ""})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_requires_bearer_token() {
    let (app, _store) = create_test_app();

    let (status, _) = send(&app, "POST", "/api/v1/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/logout")
                .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "POST", "/api/v1/auth/logout", None, Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_rejects_refresh_token_as_bearer() {
    let (app, store) = create_test_app();
    let registered = register_user(&app, "alice", "alice@x.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/logout",
        None,
        registered["refresh_token"].as_str(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(store.session_count().await, 1);
}

#[tokio::test]
async fn test_logout_is_idempotent_and_scoped_to_user() {
    let (app, store) = create_test_app();
    let alice = register_user(&app, "alice", "alice@x.com").await;
    let bob = register_user(&app, "bob", "bob@x.com").await;
    let alice_access = alice["access_token"].as_str().unwrap();

    let (status, _) = send(&app, "POST", "/api/v1/auth/logout", None, Some(alice_access)).await;
    assert_eq!(status, StatusCode::OK);

    // 访问令牌在过期前仍然有效，再次登出依然成功
    let (status, _) = send(&app, "POST", "/api/v1/auth/logout", None, Some(alice_access)).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(store.session_count().await, 1);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/auth/autologin",
        Some(json!({"token": bob["refresh_token"]})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_get_current_user() {
    let (app, _store) = create_test_app();
    let registered = register_user(&app, "alice", "alice@x.com").await;

    let (status, json) = send(
        &app,
        "GET",
        "/api/v1/auth/me",
        None,
        registered["access_token"].as_str(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], registered["user"]);
}

#[tokio::test]
async fn test_get_current_user_after_account_removed() {
    let (app, store) = create_test_app();
    let registered = register_user(&app, "alice", "alice@x.com").await;
    let user_id = registered["user"]["id"].as_str().unwrap().parse().unwrap();

    assert!(store.remove_user(user_id).await);

    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/auth/me",
        None,
        registered["access_token"].as_str(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_responses_carry_request_ids() {
    let (app, _store) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-trace-id", "trace-abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-trace-id"], "trace-abc");
    assert!(response.headers().contains_key("x-request-id"));
}
