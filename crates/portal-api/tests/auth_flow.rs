#![allow(non_snake_case)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use portal_api::{api_router, middleware::auth::AppState};
use portal_auth::{
    hash_password_with, AccountEntry, HashParams, StaticAccounts, TokenSecret, TokenService,
};
use portal_types::{IdentityPayload, Role};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "integration-secret-integration-secret";

fn accounts() -> StaticAccounts {
    let params = HashParams::new(1024, 1, 1, None).unwrap();
    let passwordHash = hash_password_with("pass-123", params).unwrap();

    let entry = |username: &str, userId: i64, role: Role| AccountEntry {
        username: username.into(),
        password_hash: passwordHash.clone(),
        user_id: userId,
        role,
        display_name: Some(format!("{username} display")),
    };

    StaticAccounts::new(vec![
        entry("student1", 7, Role::Student),
        entry("teacher1", 42, Role::Teacher),
        entry("admin1", 1, Role::Admin),
    ])
}

fn app() -> Router {
    let tokens = TokenService::new(TokenSecret::new(SECRET));
    api_router(AppState::new(tokens, accounts()))
}

fn tokens() -> TokenService {
    TokenService::new(TokenSecret::new(SECRET))
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> Response {
    let request = Request::post("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn get_with_bearer(app: &Router, path: &str, token: &str) -> Response {
    let request = Request::get(path)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn token_for(app: &Router, username: &str) -> String {
    let response = login(app, username, "pass-123").await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn login_issues_token_and_cookie() {
    let app = app();
    let response = login(&app, "teacher1", "pass-123").await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session_token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=604800"));

    let body = json_body(response).await;
    assert_eq!(body["userId"], json!(42));
    assert_eq!(body["role"], json!("teacher"));

    let identity = tokens().verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(identity.user_id(), 42);
    assert_eq!(body["expiresAt"].as_i64(), Some(identity.expires_at()));
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let app = app();
    let response = login(&app, "teacher1", "wrong").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(json_body(response).await["error"], json!("invalid credentials"));
}

#[tokio::test]
async fn session_requires_token() {
    let app = app();
    let request = Request::get("/api/v1/session").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_returns_verified_claims() {
    let app = app();
    let token = token_for(&app, "student1").await;

    let response = get_with_bearer(&app, "/api/v1/session", &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["userId"], json!(7));
    assert_eq!(body["role"], json!("student"));
    assert_eq!(body["name"], json!("student1 display"));
    assert_eq!(
        body["exp"].as_i64().unwrap() - body["iat"].as_i64().unwrap(),
        604_800
    );
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let app = app();
    let token = token_for(&app, "teacher1").await;

    let request = Request::get("/api/v1/session")
        .header(header::COOKIE, format!("session_token={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn tampered_or_foreign_tokens_are_unauthorized() {
    let app = app();
    let token = token_for(&app, "admin1").await;

    let mut tampered = token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'Q' } else { 'A' });
    let response = get_with_bearer(&app, "/api/v1/session", &tampered).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let foreign = TokenService::new(TokenSecret::new("some-other-secret-some-other-secret"))
        .issue(&IdentityPayload::new(1, Role::Admin))
        .unwrap();
    let response = get_with_bearer(&app, "/api/v1/portal/admin", &foreign).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get_with_bearer(&app, "/api/v1/session", "garbage").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let app = app();
    let expired = tokens()
        .issue_at(
            &IdentityPayload::new(42, Role::Teacher),
            Utc::now() - Duration::days(8),
        )
        .unwrap();

    let response = get_with_bearer(&app, "/api/v1/portal/teacher", &expired).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn portals_enforce_roles() {
    let app = app();
    let student = token_for(&app, "student1").await;
    let teacher = token_for(&app, "teacher1").await;

    let response = get_with_bearer(&app, "/api/v1/portal/student", &student).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["portal"], json!("student"));
    assert_eq!(body["userId"], json!(7));

    let response = get_with_bearer(&app, "/api/v1/portal/teacher", &student).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get_with_bearer(&app, "/api/v1/portal/admin", &teacher).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = get_with_bearer(&app, "/api/v1/portal/teacher", &teacher).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn inspect_is_admin_only_and_unverified() {
    let app = app();
    let admin = token_for(&app, "admin1").await;
    let teacher = token_for(&app, "teacher1").await;

    let foreign = TokenService::new(TokenSecret::new("some-other-secret-some-other-secret"))
        .issue_at(
            &IdentityPayload::new(99, Role::Student),
            Utc::now() - Duration::days(10),
        )
        .unwrap();

    let inspect = |token: &str| {
        Request::post("/api/v1/session/inspect")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "token": foreign }).to_string()))
            .unwrap()
    };

    let response = app.clone().oneshot(inspect(&teacher)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.clone().oneshot(inspect(&admin)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["verified"], json!(false));
    assert_eq!(body["expired"], json!(true));
    assert_eq!(body["claims"]["payload"]["userId"], json!(99));
}

#[tokio::test]
async fn logout_clears_cookie_but_token_stays_valid() {
    let app = app();
    let token = token_for(&app, "teacher1").await;

    let request = Request::post("/api/v1/auth/logout")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cookie.to_str().unwrap().contains("Max-Age=0"));

    // No server-side revocation.
    let response = get_with_bearer(&app, "/api/v1/session", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
}
