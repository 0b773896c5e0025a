//! User Account Tests
//!
//! Registration, login, self-service deletion, and the admin-only
//! permission ladder.

mod common;

use axum::http::StatusCode;
use common::{TestApp, DEFAULT_PASSWORD};
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Registration & login
// ===========================================================================

#[tokio::test]
async fn register_new_user() {
    let app = TestApp::new();

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "username": "newcomer",
                "email": "newcomer@example.com",
                "password": DEFAULT_PASSWORD,
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["username"].as_str().unwrap(), "newcomer");
    assert_eq!(body["permission"].as_str().unwrap(), "member");
    assert_eq!(body["followers"].as_i64().unwrap(), 0);
    // The hash must never leave the server.
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_username_is_conflict() {
    let app = TestApp::new();
    app.create_user("taken").await;

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "username": "taken",
                "email": "other@example.com",
                "password": DEFAULT_PASSWORD,
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "username already taken");
}

#[tokio::test]
async fn duplicate_email_is_conflict() {
    let app = TestApp::new();
    app.create_user("incumbent").await;

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "username": "copycat",
                "email": "incumbent@example.com",
                "password": DEFAULT_PASSWORD,
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "email already registered");
}

#[tokio::test]
async fn username_too_long_is_rejected() {
    let app = TestApp::new();

    let resp = app
        .post_json(
            "/auth/register",
            json!({
                "username": "thirteenchars",
                "email": "long@example.com",
                "password": DEFAULT_PASSWORD,
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.error_message().contains("username"));
}

#[tokio::test]
async fn login_with_wrong_password() {
    let app = TestApp::new();
    app.create_user("locked").await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": "locked@example.com", "password": "wrongpassword" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");
}

#[tokio::test]
async fn login_with_unknown_email() {
    let app = TestApp::new();

    let resp = app
        .post_json(
            "/auth/login",
            json!({ "email": "nobody@example.com", "password": DEFAULT_PASSWORD }),
            None,
        )
        .await;

    // Indistinguishable from a bad password.
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid credentials");
}

#[tokio::test]
async fn current_user_endpoint() {
    let app = TestApp::new();
    let user = app.create_user("whoami").await;

    let resp = app.get("/auth/me", Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["id"].as_str().unwrap(), user.id.to_string());

    let resp = app.get("/auth/me", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_invalidates_token() {
    let app = TestApp::new();
    let user = app.create_user("leaver").await;

    let resp = app.post_empty("/auth/logout", Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get("/auth/me", Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Profiles
// ===========================================================================

#[tokio::test]
async fn get_user_profile() {
    let app = TestApp::new();
    let user = app.create_user("profiled").await;

    let resp = app.get(&format!("/users/{}", user.id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["username"].as_str().unwrap(), "profiled");

    let resp = app.get(&format!("/users/{}", Uuid::new_v4()), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");
}

#[tokio::test]
async fn list_users_includes_registered() {
    let app = TestApp::new();
    app.create_user("alpha").await;
    app.create_user("beta").await;

    let resp = app.get("/users", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"alpha"));
    assert!(names.contains(&"beta"));
}

#[tokio::test]
async fn list_user_posts() {
    let app = TestApp::new();
    let user = app.create_user("prolific").await;
    let other = app.create_user("quiet2").await;

    app.create_post(&user, "mine1").await;
    app.create_post(&user, "mine2").await;
    app.create_post(&other, "theirs").await;

    let resp = app.get(&format!("/users/{}/posts", user.id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let posts = resp.json();
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 2);
    for post in posts {
        assert_eq!(post["author"]["id"].as_str().unwrap(), user.id.to_string());
    }
}

// ===========================================================================
// Deletion
// ===========================================================================

#[tokio::test]
async fn user_can_delete_own_account() {
    let app = TestApp::new();
    let user = app.create_user("ephemeral").await;

    let resp = app.delete(&format!("/users/{}", user.id), Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get(&format!("/users/{}", user.id), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_cannot_delete_someone_else() {
    let app = TestApp::new();
    let victim = app.create_user("victim").await;
    let attacker = app.create_user("attacker").await;

    let resp = app
        .delete(&format!("/users/{}", victim.id), Some(&attacker.token))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.get(&format!("/users/{}", victim.id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn admin_can_delete_anyone() {
    let app = TestApp::new();
    let target = app.create_user("target").await;
    let admin = app.create_user("janitor").await;
    app.make_admin(admin.id).await;

    let resp = app
        .delete(&format!("/users/{}", target.id), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn deleting_a_liker_repairs_post_counters() {
    let app = TestApp::new();
    let author = app.create_user("survivor").await;
    let liker = app.create_user("departed").await;
    let post_id = app.create_post(&author, "repaired").await;

    app.post_empty(&format!("/posts/{post_id}/like"), Some(&liker.token))
        .await;
    app.delete(&format!("/users/{}", liker.id), Some(&liker.token))
        .await;

    let resp = app.get(&format!("/posts/{post_id}"), None).await;
    assert_eq!(resp.json()["likes_count"].as_i64().unwrap(), 0);
}

// ===========================================================================
// Permission ladder
// ===========================================================================

#[tokio::test]
async fn admin_upgrades_member_one_step_at_a_time() {
    let app = TestApp::new();
    let user = app.create_user("climber").await;
    let admin = app.create_user("boss").await;
    app.make_admin(admin.id).await;

    let resp = app
        .put_empty(&format!("/users/{}/upgrade", user.id), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["permission"].as_str().unwrap(), "redactor");

    let resp = app
        .put_empty(&format!("/users/{}/upgrade", user.id), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["permission"].as_str().unwrap(), "admin");

    // No level above admin.
    let resp = app
        .put_empty(&format!("/users/{}/upgrade", user.id), Some(&admin.token))
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn non_admin_cannot_upgrade() {
    let app = TestApp::new();
    let user = app.create_user("hopeful").await;
    let peer = app.create_user("peer").await;

    let resp = app
        .put_empty(&format!("/users/{}/upgrade", user.id), Some(&peer.token))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.get(&format!("/users/{}", user.id), None).await;
    assert_eq!(resp.json()["permission"].as_str().unwrap(), "member");
}
