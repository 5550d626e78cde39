#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use bookmark_api::{
    AppConfig, AppState, MemoryRepository, RepositoryState, auth, create_router,
    models::{BookmarkFields, NewUser},
    repository::Repository,
};
use std::sync::{Arc, LazyLock};
use tower::ServiceExt;

pub const ADMIN_ID: i64 = 1;
pub const USER1_ID: i64 = 2;
pub const USER2_ID: i64 = 3;

pub const PASSWORD: &str = "password";

// Hashing is deliberately slow, so every seeded account shares one hash.
static PASSWORD_HASH: LazyLock<String> =
    LazyLock::new(|| auth::hash_password(PASSWORD).expect("hash test password"));

pub fn new_user(username: &str, is_staff: bool) -> NewUser {
    NewUser {
        username: username.to_string(),
        password_hash: PASSWORD_HASH.clone(),
        email: String::new(),
        is_staff,
        is_superuser: is_staff,
    }
}

/// seed
///
/// admin(1, staff), user1(2), user2(3), "Bookmark 1"(1, owned by user1) and
/// "Bookmark 2"(2, owned by user2).
pub async fn seed(repo: &dyn Repository) {
    repo.create_user(new_user("admin", true)).await.unwrap();
    repo.create_user(new_user("user1", false)).await.unwrap();
    repo.create_user(new_user("user2", false)).await.unwrap();

    repo.create_bookmark(
        USER1_ID,
        BookmarkFields {
            name: "Bookmark 1".into(),
            url: "http://www.bookmark1.com".into(),
        },
    )
    .await
    .unwrap();
    repo.create_bookmark(
        USER2_ID,
        BookmarkFields {
            name: "Bookmark 2".into(),
            url: "http://www.bookmark2.com".into(),
        },
    )
    .await
    .unwrap();
}

pub async fn seeded_state() -> AppState {
    let repo = Arc::new(MemoryRepository::new()) as RepositoryState;
    seed(repo.as_ref()).await;
    AppState {
        repo,
        config: AppConfig::default(),
    }
}

pub async fn seeded_app() -> Router {
    create_router(seeded_state().await)
}

/// A JWT for an existing user, signed with the test configuration.
pub async fn token_for(state: &AppState, user_id: i64) -> String {
    let user = state
        .repo
        .find_user(user_id, bookmark_api::policy::Scope::Unrestricted)
        .await
        .unwrap()
        .expect("seeded user");
    auth::issue_token(&user, &state.config).unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

/// Sends one request through the full router. `user` authenticates through the local
/// `x-user-id` header, the counterpart of forcing authentication in a test client.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<i64>,
    body: Option<serde_json::Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user {
        builder = builder.header("x-user-id", id.to_string());
    }

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    send_request(app, request).await
}

pub async fn send_request(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec();

    TestResponse {
        status,
        headers,
        body,
    }
}
