#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use encre::app::feed::FeedConfig;
use encre::store::memory::MemStore;
use encre::store::Store;
use encre::AppState;

pub const DEFAULT_PASSWORD: &str = "testpassword123";

// ---------------------------------------------------------------------------
// TestApp — fresh in-memory app per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub feed_path: std::path::PathBuf,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let feed_path =
            std::env::temp_dir().join(format!("encre-feed-{}.xml", Uuid::new_v4()));
        let state = AppState {
            store: Arc::new(MemStore::new()),
            feed: FeedConfig {
                path: feed_path.clone(),
                title: "Encre test".to_string(),
                site_url: "http://localhost".to_string(),
                description: "test feed".to_string(),
            },
            session_ttl_hours: 1,
        };
        let router = encre::http::router(state.clone());

        Self {
            router,
            state,
            feed_path,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.state.store
    }

    // ------------------------------------------------------------------
    // Request helpers
    // ------------------------------------------------------------------

    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("failed to build request"),
            None => builder.body(Body::empty()).expect("failed to build request"),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, None, token).await
    }

    pub async fn get_with_headers(
        &self,
        uri: &str,
        token: Option<&str>,
    ) -> (TestResponse, axum::http::HeaderMap) {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty()).expect("failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes();

        (TestResponse { status, body_bytes }, headers)
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: Value,
        token: Option<&str>,
    ) -> TestResponse {
        self.request(Method::POST, uri, Some(body), token).await
    }

    pub async fn post_empty(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::POST, uri, None, token).await
    }

    pub async fn put_json(
        &self,
        uri: &str,
        body: Value,
        token: Option<&str>,
    ) -> TestResponse {
        self.request(Method::PUT, uri, Some(body), token).await
    }

    pub async fn put_empty(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::PUT, uri, None, token).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, None, token).await
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    /// Registers and logs in a user. Usernames are capped at 12 chars.
    pub async fn create_user(&self, username: &str) -> TestUser {
        let email = format!("{username}@example.com");

        let resp = self
            .post_json(
                "/auth/register",
                json!({
                    "username": username,
                    "email": email,
                    "password": DEFAULT_PASSWORD,
                }),
                None,
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "register failed: {}", resp.error_message());
        let id = resp.json()["id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("register response has no id");

        let resp = self
            .post_json(
                "/auth/login",
                json!({ "email": email, "password": DEFAULT_PASSWORD }),
                None,
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "login failed: {}", resp.error_message());
        let token = resp.json()["token"]
            .as_str()
            .expect("login response has no token")
            .to_string();

        TestUser {
            id,
            username: username.to_string(),
            email,
            token,
        }
    }

    /// Valid post body: content at the 200-char minimum.
    pub fn valid_post_body(marker: &str) -> Value {
        let mut content = format!("[{marker}] ");
        content.push_str(&"lorem ipsum ".repeat(20));
        assert!(content.chars().count() >= 200);
        json!({ "content": content, "tags": "test", "image": "cover.png" })
    }

    pub async fn create_post(&self, user: &TestUser, marker: &str) -> Uuid {
        let resp = self
            .post_json("/posts", Self::valid_post_body(marker), Some(&user.token))
            .await;
        assert_eq!(resp.status, StatusCode::OK, "create post failed: {}", resp.error_message());
        resp.json()["id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("create post response has no id")
    }

    pub async fn make_admin(&self, user_id: Uuid) {
        self.state
            .store
            .set_permission(user_id, encre::domain::user::Permission::Admin)
            .await
            .expect("failed to set permission")
            .expect("no such user");
    }
}
