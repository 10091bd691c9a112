//! Integration tests for authentication endpoints against Postgres

mod common;

use axum::http::StatusCode;
use serde_json::json;

const PASSWORD: &str = "correct-horse-battery-staple";

#[tokio::test]
#[ignore = "requires database"]
async fn test_login_success() {
    let app = common::TestApp::new().await;
    let user = app.create_user("admin", PASSWORD, true).await;

    let body = json!({ "username": user.username, "password": PASSWORD });
    let (status, response) = app.post_json("/api/v1/auth/login", &body, "10.1.0.1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["token_type"], "Bearer");
    assert_eq!(response["user"]["id"], user.id.to_string());
    assert!(!response["refresh_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_login_wrong_password_then_lockout() {
    let app = common::TestApp::new().await;
    let user = app.create_user("locked", PASSWORD, true).await;
    let wrong = json!({ "username": user.username, "password": "not-the-password" });

    for _ in 0..5 {
        let (status, response) = app.post_json("/api/v1/auth/login", &wrong, "10.1.0.2").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response["error"]["message"], "Invalid credentials");
    }

    let right = json!({ "username": user.username, "password": PASSWORD });
    let (status, response) = app.post_json("/api/v1/auth/login", &right, "10.1.0.2").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(response["error"]["seconds_remaining"].as_u64().unwrap() <= 30);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_login_unknown_user() {
    let app = common::TestApp::new().await;

    let body = json!({ "username": "no_such_user", "password": PASSWORD });
    let (status, response) = app.post_json("/api/v1/auth/login", &body, "10.1.0.3").await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"]["message"], "Invalid credentials");
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_admin_profile_and_password_change() {
    let app = common::TestApp::new().await;
    let user = app.create_user("owner", PASSWORD, true).await;

    let login = json!({ "username": user.username, "password": PASSWORD });
    let (_, response) = app.post_json("/api/v1/auth/login", &login, "10.1.0.4").await;
    let token = response["access_token"].as_str().unwrap().to_string();

    let (status, profile) = app.get("/api/v1/admin/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], user.username);

    let change = json!({ "current_password": PASSWORD, "new_password": "a-brand-new-password" });
    let (status, _) = app
        .put_json("/api/v1/admin/profile/password", &change, &token)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post_json("/api/v1/auth/login", &login, "10.1.0.4").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let relogin = json!({ "username": user.username, "password": "a-brand-new-password" });
    let (status, _) = app.post_json("/api/v1/auth/login", &relogin, "10.1.0.4").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_non_admin_is_forbidden() {
    let app = common::TestApp::new().await;
    let user = app.create_user("reader", PASSWORD, false).await;

    let login = json!({ "username": user.username, "password": PASSWORD });
    let (status, response) = app.post_json("/api/v1/auth/login", &login, "10.1.0.5").await;
    assert_eq!(status, StatusCode::OK);
    let token = response["access_token"].as_str().unwrap();

    let (status, _) = app.get("/api/v1/admin/profile", Some(token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_admin_profile_update_persists() {
    let app = common::TestApp::new().await;
    let user = app.create_user("editor", PASSWORD, true).await;

    let login = json!({ "username": user.username, "password": PASSWORD });
    let (_, response) = app.post_json("/api/v1/auth/login", &login, "10.1.0.6").await;
    let token = response["access_token"].as_str().unwrap().to_string();

    let email = format!("renamed.{}", user.email);
    let update = json!({ "first_name": "Grace", "last_name": "Hopper", "email": email });
    let (status, profile) = app.put_json("/api/v1/admin/profile", &update, &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["first_name"], "Grace");

    let (status, profile) = app.get("/api/v1/admin/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["last_name"], "Hopper");
    assert_eq!(profile["email"], email);
}
